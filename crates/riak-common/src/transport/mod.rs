//! Riak Transport Layer
//!
//! Frames messages onto a byte stream and owns the TCP connection to one node.
//!
//! # Components
//!
//! - **[`codec`]**: stateless frame encode/decode over any `AsyncRead`/`AsyncWrite`
//! - **[`Connection`]**: lazily opened TCP stream with per-operation timeouts
//!
//! # Message Size Limits
//!
//! Frames whose length field exceeds [`codec::MAX_FRAME_SIZE`] are rejected
//! before the payload is read.

pub mod codec;
pub mod connection;

pub use connection::{Connection, ConnectionConfig, Credentials};
