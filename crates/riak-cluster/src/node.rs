use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use riak_client::{run_guarded, ConnectionPool, PooledConnection};
use riak_common::protocol::error::{Result, ResultCode, RiakError};
use riak_common::protocol::messages::{PingReq, PingResp};
use riak_common::transport::{Connection, Credentials};

use crate::config::{DeactivationPolicy, NodeConfig};

/// Health of a node as tracked by the load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Online,
    Offline,
}

/// One Riak node: an address and the pool of connections to it.
///
/// A node is a passive resource holder. It never changes its own health;
/// the cluster and the health monitor move it between the load balancer's
/// online and offline sets. What it does own is the classification of
/// failures at its boundary: pool exhaustion becomes
/// [`RiakError::NoConnections`], raw transport faults and panics become
/// [`RiakError::Communication`] with `node_offline` set according to the
/// [`DeactivationPolicy`]. Server errors and protocol errors pass through.
pub struct Node {
    addr: String,
    pool: ConnectionPool,
    policy: DeactivationPolicy,
}

impl Node {
    pub fn new(
        config: &NodeConfig,
        credentials: Option<Credentials>,
        policy: DeactivationPolicy,
    ) -> Self {
        let addr = config.addr();
        let pool = ConnectionPool::new(
            addr.clone(),
            config.pool_config(),
            config.connection_config(credentials),
        );
        Self { addr, pool, policy }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs `op` on a checked-out connection and returns its classified result.
    ///
    /// The connection is checked back in afterwards: recycled on success or
    /// on a server error, discarded after a transport fault, a protocol
    /// error or a panic.
    pub async fn use_connection<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'c> Fn(&'c mut Connection) -> BoxFuture<'c, Result<T>>,
    {
        let mut conn = self.checkout().await?;

        let result = run_guarded(op(&mut *conn)).await;

        match result {
            Ok(value) => {
                conn.finish();
                Ok(value)
            }
            Err(e) => {
                if poisons_connection(&e) {
                    conn.mark_unusable();
                }
                drop(conn);
                Err(self.classify(e))
            }
        }
    }

    /// Hands a checked-out connection to `op` for a multi-response exchange.
    ///
    /// Ownership of the connection moves into `op`; it is checked back in
    /// when whatever `op` returns (typically a response stream) drops it.
    /// The connection arrives with an open exchange: unless the holder ends
    /// it, dropping the connection resets its transport. That covers `op`
    /// failing or panicking after it sent a request.
    pub async fn use_delayed_connection<S, F>(&self, op: F) -> Result<S>
    where
        F: Fn(PooledConnection) -> BoxFuture<'static, Result<S>>,
    {
        let mut conn = self.checkout().await?;
        conn.begin_exchange();
        run_guarded(op(conn)).await.map_err(|e| self.classify(e))
    }

    /// Classifies the errors of a response stream handed back by
    /// [`use_delayed_connection`](Self::use_delayed_connection), the same
    /// way a direct call's result is classified.
    pub fn classify_stream<T>(
        self: &Arc<Self>,
        stream: BoxStream<'static, Result<T>>,
    ) -> BoxStream<'static, Result<T>>
    where
        T: Send + 'static,
    {
        let node = Arc::clone(self);
        stream.map(move |item| item.map_err(|e| node.classify(e))).boxed()
    }

    /// Checks out a connection, with exhaustion classified as `NoConnections`.
    pub async fn checkout(&self) -> Result<PooledConnection> {
        self.pool.checkout().await.map_err(|e| self.classify(e))
    }

    /// Liveness probe: one ping round trip.
    pub async fn ping(&self) -> Result<()> {
        self.use_connection(|conn| {
            async move {
                let _: PingResp = conn.write_read(&PingReq).await?;
                Ok(())
            }
            .boxed()
        })
        .await
    }

    /// Disconnects every pooled connection.
    pub async fn dispose(&self) {
        self.pool.dispose().await;
    }

    fn classify(&self, err: RiakError) -> RiakError {
        let implies_offline = self.policy.implies_offline(&err);

        match err {
            RiakError::PoolExhausted(waited_ms) => RiakError::NoConnections(format!(
                "{}: pool of {} exhausted after {}ms",
                self.addr,
                self.pool.pool_size(),
                waited_ms
            )),
            RiakError::Communication {
                message,
                node_offline,
            } => RiakError::Communication {
                message: format!("{}: {}", self.addr, message),
                node_offline: node_offline || implies_offline,
            },
            e if e.is_transport() => RiakError::Communication {
                message: e.to_string(),
                node_offline: implies_offline,
            },
            other => other,
        }
    }
}

/// Failures after which the connection's stream position is unknown.
fn poisons_connection(err: &RiakError) -> bool {
    matches!(
        err.result_code(),
        ResultCode::CommunicationError | ResultCode::InvalidResponse
    )
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("addr", &self.addr)
            .field("pool", &self.pool)
            .field("policy", &self.policy)
            .finish()
    }
}
