use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::FutureExt;
use parking_lot::Mutex;
use riak_client::{stream_responses, Endpoint, PinnedEndpoint, PooledConnection};
use riak_common::protocol::error::{Result, ResultCode, RiakError};
use riak_common::protocol::messages::{
    GetServerInfoReq, GetServerInfoResp, ListKeysReq, ListKeysResp, PingReq, PingResp,
};
use riak_common::transport::Connection;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ClusterConfig, RetryConfig, RetryTarget};
use crate::health_checker::HealthMonitor;
use crate::load_balancer::LoadBalancer;
use crate::node::Node;

/// Riak cluster client - picks a node per operation and retries.
///
/// # Retry Logic
///
/// Each call gets the configured budget of attempts. Per attempt:
///
/// 1. Budget spent: fail with [`RiakError::NoRetries`]
/// 2. Shutting down: fail with [`RiakError::ShuttingDown`]
/// 3. No online node: fail with [`RiakError::ClusterOffline`]
/// 4. Run the operation on the selected node; success returns at once
/// 5. `NoConnections`: wait and try again
/// 6. `CommunicationError`: deactivate the node if the error says it is
///    offline, then wait and try again
/// 7. Anything else (server errors, protocol errors) returns at once
///
/// Once an attempt has failed, whatever ends the loop later, the caller sees
/// the error of that first attempt. There is no wait after the last attempt.
///
/// # Health Monitoring
///
/// A [`HealthMonitor`] task is started with the cluster and pings deactivated
/// nodes every `node_poll_interval_ms`. [`shutdown`](Self::shutdown) stops it
/// and waits for it to finish.
///
/// # Example
///
/// ```rust,no_run
/// use futures::FutureExt;
/// use riak_cluster::{Cluster, ClusterConfig, NodeConfig};
/// use riak_common::{PingReq, PingResp};
///
/// # #[tokio::main]
/// # async fn main() -> riak_common::Result<()> {
/// let cluster = Cluster::new(ClusterConfig {
///     nodes: vec![NodeConfig::new("127.0.0.1", 8087)],
///     ..Default::default()
/// })
/// .await?;
///
/// let pong: PingResp = cluster
///     .use_connection(|conn| async move { conn.write_read(&PingReq).await }.boxed())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Cluster {
    nodes: Vec<Arc<Node>>,
    load_balancer: Arc<LoadBalancer>,
    retry: RetryConfig,
    retry_target: RetryTarget,
    disposing: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Cluster {
    /// Builds every node and pool from `config` and starts the health monitor.
    ///
    /// No connection is opened here.
    ///
    /// # Errors
    ///
    /// [`RiakError::InvalidConfig`] if the configuration does not validate.
    pub async fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        let nodes: Vec<Arc<Node>> = config
            .nodes
            .iter()
            .map(|node| {
                Arc::new(Node::new(
                    node,
                    config.credentials.clone(),
                    config.deactivation,
                ))
            })
            .collect();

        let load_balancer = Arc::new(LoadBalancer::new(nodes.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = HealthMonitor::new(
            load_balancer.clone(),
            config.node_poll_interval(),
            shutdown_rx,
        )
        .spawn();

        info!(
            nodes = nodes.len(),
            attempts = config.retry.attempts,
            wait_ms = config.retry.wait_ms,
            "Cluster initialized"
        );

        Ok(Self {
            nodes,
            load_balancer,
            retry: config.retry,
            retry_target: config.retry_target,
            disposing: AtomicBool::new(false),
            shutdown_tx,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    /// Every configured node, online or not.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.load_balancer
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }

    pub fn is_shutting_down(&self) -> bool {
        self.disposing.load(Ordering::Acquire)
    }

    /// Runs `op` against a connection of some online node, retrying per the
    /// cluster's budget. `op` may run several times, on different nodes.
    pub async fn use_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'c> Fn(&'c mut Connection) -> BoxFuture<'c, Result<T>> + Send + Sync,
    {
        let op = &op;
        self.run_with_retries(move |node| async move { node.use_connection(op).await })
            .await
    }

    /// Like [`use_connection`](Self::use_connection), but `op` takes ownership
    /// of the connection and returns something that keeps it, usually a
    /// response stream. The connection is checked back in when that value
    /// releases it, on every path. Unless the holder ends the exchange, the
    /// transport is reset on the way back.
    pub async fn use_delayed_connection<S, F>(&self, op: F) -> Result<S>
    where
        S: Send + 'static,
        F: Fn(PooledConnection) -> BoxFuture<'static, Result<S>> + Send + Sync,
    {
        let op = &op;
        self.run_with_retries(move |node| async move { node.use_delayed_connection(op).await })
            .await
    }

    /// Checks out one connection for a sequence of operations.
    ///
    /// Node selection and checkout are retried like any operation; the
    /// operations run through the returned endpoint are not.
    pub async fn pinned(&self) -> Result<PinnedEndpoint> {
        self.run_with_retries(|node| async move { node.checkout().await })
            .await
            .map(PinnedEndpoint::new)
    }

    /// One ping round trip to some online node.
    pub async fn ping(&self) -> Result<()> {
        let _: PingResp = self
            .use_connection(|conn| async move { conn.write_read(&PingReq).await }.boxed())
            .await?;
        Ok(())
    }

    pub async fn server_info(&self) -> Result<GetServerInfoResp> {
        self.use_connection(|conn| async move { conn.write_read(&GetServerInfoReq).await }.boxed())
            .await
    }

    /// Streams the keys of `bucket`, one response page at a time.
    ///
    /// Sending the request is retried like any operation. Errors read off
    /// the stream afterwards are classified by the serving node but end the
    /// stream without a retry.
    pub async fn list_keys(
        &self,
        bucket: impl Into<String>,
    ) -> Result<BoxStream<'static, Result<ListKeysResp>>> {
        let request = ListKeysReq {
            bucket: bucket.into(),
            ..Default::default()
        };
        let request = &request;

        self.run_with_retries(move |node| async move {
            let pages = node
                .use_delayed_connection(|mut conn| {
                    let request = request.clone();
                    async move {
                        conn.send(&request).await?;
                        Ok(stream_responses(conn, |page: &ListKeysResp| page.done))
                    }
                    .boxed()
                })
                .await?;
            Ok(node.classify_stream(pages))
        })
        .await
    }

    /// Takes a node out of rotation. A node that is already offline is left alone.
    pub fn deactivate_node(&self, node: &Node) {
        if self.load_balancer.remove_node(node.addr()) {
            warn!(addr = %node.addr(), "Node deactivated");
        }
    }

    /// Stops the health monitor, waits for it, and disposes every pool.
    ///
    /// Calls already in flight finish their current attempt; new calls and
    /// retries fail with [`RiakError::ShuttingDown`]. Calling it twice is a no-op.
    pub async fn shutdown(&self) {
        if self.disposing.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Cluster shutting down");

        let _ = self.shutdown_tx.send(true);
        let monitor = self.monitor.lock().take();
        if let Some(handle) = monitor {
            if let Err(e) = handle.await {
                warn!(error = %e, "Health monitor ended abnormally");
            }
        }

        for node in &self.nodes {
            node.dispose().await;
        }
    }

    fn next_node(&self, previous: Option<&Node>) -> Option<Arc<Node>> {
        if self.retry_target == RetryTarget::SameNode {
            if let Some(node) = previous.and_then(|n| self.load_balancer.online_node(n.addr())) {
                return Some(node);
            }
        }
        self.load_balancer.select_node()
    }

    async fn run_with_retries<T, A, Fut>(&self, attempt: A) -> Result<T>
    where
        A: Fn(Arc<Node>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut remaining = i64::from(self.retry.attempts) - 1;
        let mut first_error: Option<RiakError> = None;
        let mut previous: Option<Arc<Node>> = None;

        loop {
            if remaining < 0 {
                return Err(first_error.unwrap_or(RiakError::NoRetries));
            }
            if self.is_shutting_down() {
                return Err(first_error.unwrap_or(RiakError::ShuttingDown));
            }
            let node = match self.next_node(previous.as_deref()) {
                Some(node) => node,
                None => return Err(first_error.unwrap_or(RiakError::ClusterOffline)),
            };

            let err = match attempt(node.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match err.result_code() {
                ResultCode::NoConnections => {}
                ResultCode::CommunicationError => {
                    if err.node_offline() {
                        self.deactivate_node(&node);
                    }
                }
                _ => return Err(first_error.unwrap_or(err)),
            }

            remaining -= 1;
            debug!(
                addr = %node.addr(),
                error = %err,
                attempts_left = remaining + 1,
                "Attempt failed, retrying"
            );

            if first_error.is_none() {
                first_error = Some(err);
            }
            previous = Some(node);

            if remaining >= 0 {
                tokio::time::sleep(self.retry.wait()).await;
            }
        }
    }
}

impl Endpoint for Cluster {
    fn use_connection<T, F>(&self, op: F) -> impl Future<Output = Result<T>> + Send
    where
        T: Send + 'static,
        F: for<'c> Fn(&'c mut Connection) -> BoxFuture<'c, Result<T>> + Send + Sync,
    {
        Cluster::use_connection(self, op)
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.disposing.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.monitor.get_mut().take() {
            handle.abort();
        }
    }
}
