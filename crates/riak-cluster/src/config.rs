use std::collections::HashSet;
use std::time::Duration;

use riak_client::PoolConfig;
use riak_common::protocol::error::{Result, ResultCode, RiakError};
use riak_common::transport::{ConnectionConfig, Credentials};
use serde::{Deserialize, Serialize};

/// One node of the cluster.
///
/// # Default Configuration
///
/// - `host`: `127.0.0.1`, `port`: 8087
/// - `pool_size`: 30
/// - `connect_timeout_ms`, `read_timeout_ms`, `write_timeout_ms`: 4000
/// - `acquire_timeout_ms`: 5000
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Ceiling on live connections to this node
    pub pool_size: usize,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// How long a checkout waits at the ceiling before failing
    pub acquire_timeout_ms: u64,
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// `host:port`, the node's identity.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            pool_size: self.pool_size,
            acquire_timeout_ms: self.acquire_timeout_ms,
        }
    }

    pub fn connection_config(&self, credentials: Option<Credentials>) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.read_timeout_ms,
            write_timeout_ms: self.write_timeout_ms,
            credentials,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        let pool = PoolConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8087,
            pool_size: pool.pool_size,
            connect_timeout_ms: connection.connect_timeout_ms,
            read_timeout_ms: connection.read_timeout_ms,
            write_timeout_ms: connection.write_timeout_ms,
            acquire_timeout_ms: pool.acquire_timeout_ms,
        }
    }
}

/// Retry budget for one logical operation.
///
/// `attempts` is the total number of attempts, so a budget of N performs at
/// most N attempts separated by N - 1 waits of `wait_ms`. A budget of 0 fails
/// immediately with [`RiakError::NoRetries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub wait_ms: u64,
}

impl RetryConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            wait_ms: 200,
        }
    }
}

/// Which communication errors take a node out of rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationPolicy {
    /// Only failures showing the peer is gone: refused or failed connects,
    /// resets, aborts, broken pipes and EOF. Timeouts and panics inside an
    /// operation count against the request, not the node.
    #[default]
    TransportFailures,
    /// Every communication error, timeouts and panics included.
    AnyCommunicationError,
}

impl DeactivationPolicy {
    /// Whether `err`, raised while talking to a node, means the node is offline.
    pub fn implies_offline(self, err: &RiakError) -> bool {
        match self {
            DeactivationPolicy::TransportFailures => err.is_connection_loss(),
            DeactivationPolicy::AnyCommunicationError => {
                err.result_code() == ResultCode::CommunicationError
            }
        }
    }
}

/// Where a retry goes after a transient failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryTarget {
    /// The next node in round-robin order.
    #[default]
    Rotate,
    /// The node that just failed, while it is still online.
    SameNode,
}

/// Immutable cluster configuration, consumed by [`Cluster::new`](crate::Cluster::new).
///
/// # Default Configuration
///
/// - `nodes`: empty
/// - `node_poll_interval_ms`: 5000
/// - `retry`: 3 attempts, 200ms apart
/// - `deactivation`: [`DeactivationPolicy::TransportFailures`]
/// - `retry_target`: [`RetryTarget::Rotate`]
/// - `credentials`: none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeConfig>,
    /// Pause between health monitor passes over the offline nodes
    pub node_poll_interval_ms: u64,
    pub retry: RetryConfig,
    pub deactivation: DeactivationPolicy,
    pub retry_target: RetryTarget,
    /// Applied to every connection of every node
    pub credentials: Option<Credentials>,
}

impl ClusterConfig {
    pub fn node_poll_interval(&self) -> Duration {
        Duration::from_millis(self.node_poll_interval_ms)
    }

    /// Rejects configurations the cluster cannot honor.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for node in &self.nodes {
            if node.host.trim().is_empty() {
                return Err(RiakError::InvalidConfig("node host is empty".to_string()));
            }
            if node.port == 0 {
                return Err(RiakError::InvalidConfig(format!(
                    "node {} has port 0",
                    node.host
                )));
            }
            if node.pool_size == 0 {
                return Err(RiakError::InvalidConfig(format!(
                    "node {} has a pool size of 0",
                    node.addr()
                )));
            }
            if !seen.insert(node.addr()) {
                return Err(RiakError::InvalidConfig(format!(
                    "node {} is listed more than once",
                    node.addr()
                )));
            }
        }

        if self.node_poll_interval_ms == 0 {
            return Err(RiakError::InvalidConfig(
                "node_poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            node_poll_interval_ms: 5000,
            retry: RetryConfig::default(),
            deactivation: DeactivationPolicy::default(),
            retry_target: RetryTarget::default(),
            credentials: None,
        }
    }
}
