//! Riak Client Plumbing
//!
//! Everything between a single [`Connection`](riak_common::Connection) and the
//! cluster: the bounded per-node [`ConnectionPool`], the RAII
//! [`PooledConnection`] guard that checks a connection back in when dropped,
//! [`stream_responses`] for multi-frame exchanges, and the [`Endpoint`] seam
//! shared by the cluster and by [`PinnedEndpoint`].

pub mod endpoint;
pub mod pool;
pub mod streaming;

pub use endpoint::{run_guarded, Endpoint, PinnedEndpoint};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use streaming::stream_responses;
