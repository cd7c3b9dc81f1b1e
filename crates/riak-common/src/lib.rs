//! Riak Common Types and Transport
//!
//! This crate provides the protocol definitions and the single-connection
//! transport shared by the pool and cluster crates.
//!
//! # Overview
//!
//! - **Protocol Layer**: the static message-code table, typed messages and the
//!   [`RiakError`] taxonomy every failure is classified into
//! - **Transport Layer**: the length-prefixed frame codec and [`Connection`],
//!   which owns one lazily opened TCP stream to one node
//!
//! # Wire Format
//!
//! ```text
//! [4-byte big-endian length][1-byte message code][(length - 1) bytes payload]
//! ```
//!
//! The length counts the code byte and the payload, never itself. Code 0 is
//! reserved for the server's error response.
//!
//! # Example
//!
//! ```no_run
//! use riak_common::{Connection, ConnectionConfig, PingReq, PingResp};
//!
//! # #[tokio::main]
//! # async fn main() -> riak_common::Result<()> {
//! let mut conn = Connection::new("127.0.0.1:8087", ConnectionConfig::default());
//! let _pong: PingResp = conn.write_read(&PingReq).await?;
//! # Ok(())
//! # }
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{Connection, ConnectionConfig, Credentials};
