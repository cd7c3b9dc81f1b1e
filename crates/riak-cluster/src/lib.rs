//! Riak Cluster
//!
//! Turns a static list of nodes into one resilient endpoint.
//!
//! # Components
//!
//! - **[`Cluster`]**: selects a node per operation and retries transient
//!   failures, deactivating nodes that turn out to be unreachable
//! - **[`LoadBalancer`]**: round-robin over online nodes, with an offline holding set
//! - **[`HealthMonitor`]**: background task that pings offline nodes and
//!   puts them back into rotation
//! - **[`Node`]**: one host:port with its connection pool; classifies raw
//!   transport faults into the coarse error taxonomy
//!
//! # Example
//!
//! ```rust,no_run
//! use riak_cluster::{Cluster, ClusterConfig, NodeConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> riak_common::Result<()> {
//! let config = ClusterConfig {
//!     nodes: vec![NodeConfig::new("10.0.0.1", 8087), NodeConfig::new("10.0.0.2", 8087)],
//!     ..Default::default()
//! };
//! let cluster = Cluster::new(config).await?;
//! cluster.ping().await?;
//! cluster.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod health_checker;
pub mod load_balancer;
pub mod node;

pub use cluster::Cluster;
pub use config::{ClusterConfig, DeactivationPolicy, NodeConfig, RetryConfig, RetryTarget};
pub use health_checker::HealthMonitor;
pub use load_balancer::LoadBalancer;
pub use node::{Node, NodeState};
pub use riak_client::{Endpoint, PinnedEndpoint};
pub use riak_common::{Credentials, Result, ResultCode, RiakError};
