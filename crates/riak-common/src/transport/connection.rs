use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

use crate::protocol::error::{Result, RiakError};
use crate::protocol::messages::{AuthReq, AuthResp, Message};
use crate::transport::codec;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// User name and password sent with `AuthReq` on every new transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Timeouts and optional credentials, fixed when a connection is created.
///
/// # Default Configuration
///
/// - `connect_timeout_ms`: 4000
/// - `read_timeout_ms`: 4000
/// - `write_timeout_ms`: 4000
/// - `credentials`: none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Maximum time to establish the TCP connection
    pub connect_timeout_ms: u64,
    /// Maximum time to wait for one complete response frame
    pub read_timeout_ms: u64,
    /// Maximum time to write one complete request frame
    pub write_timeout_ms: u64,
    /// Sent with `AuthReq` right after the transport opens
    pub credentials: Option<Credentials>,
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 4000,
            read_timeout_ms: 4000,
            write_timeout_ms: 4000,
            credentials: None,
        }
    }
}

/// One byte stream to one node.
///
/// The TCP stream is opened lazily by [`ensure_connected`](Self::ensure_connected),
/// which every [`send`](Self::send) and [`receive`](Self::receive) calls first.
/// An I/O failure, a timeout or an undecodable frame closes the transport and
/// marks the connection faulted; the pool discards faulted connections instead
/// of recycling them. A server error frame is read completely and leaves the
/// connection usable.
///
/// There is no reconnect policy here. After [`disconnect`](Self::disconnect)
/// the next call simply opens a new transport.
pub struct Connection {
    id: u64,
    addr: String,
    config: ConnectionConfig,
    stream: Option<TcpStream>,
    faulted: bool,
}

impl Connection {
    /// Creates an unconnected connection. No I/O happens here.
    pub fn new(addr: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            id: CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            addr: addr.into(),
            config,
            stream: None,
            faulted: false,
        }
    }

    /// Process-unique identifier, stable for the life of the connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True only if a transport exists and still reports a peer.
    pub fn is_connected(&self) -> bool {
        self.stream
            .as_ref()
            .map(|stream| stream.peer_addr().is_ok())
            .unwrap_or(false)
    }

    /// Whether an I/O or protocol failure has made this connection unfit for reuse.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Opens the transport if there is none and returns it.
    pub async fn ensure_connected(&mut self) -> Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = self.open().await?;
            return Ok(self.stream.insert(stream));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| RiakError::ConnectionClosed(self.addr.clone()))
    }

    /// Encodes and writes one request frame.
    pub async fn send<T: Message>(&mut self, message: &T) -> Result<()> {
        let frame = codec::encode(message)?;
        let write_timeout = self.config.write_timeout();
        let stream = self.ensure_connected().await?;

        let outcome = time::timeout(write_timeout, async {
            stream.write_all(&frame).await?;
            stream.flush().await
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                let err = self.map_io_error(e);
                self.fault();
                Err(err)
            }
            Err(_) => {
                self.fault();
                Err(RiakError::SendTimeout {
                    addr: self.addr.clone(),
                    timeout_ms: self.config.write_timeout_ms,
                })
            }
        }
    }

    /// Reads one response frame of type `T`.
    pub async fn receive<T: Message>(&mut self) -> Result<T> {
        let read_timeout = self.config.read_timeout();
        let stream = self.ensure_connected().await?;

        let outcome = time::timeout(read_timeout, codec::decode::<T, _>(stream)).await;

        match outcome {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(e @ RiakError::Server { .. })) => Err(e),
            Ok(Err(RiakError::Io(e))) => {
                let err = self.map_io_error(e);
                self.fault();
                Err(err)
            }
            Ok(Err(e)) => {
                warn!(addr = %self.addr, id = self.id, error = %e, "Protocol desync, dropping transport");
                self.fault();
                Err(e)
            }
            Err(_) => {
                self.fault();
                Err(RiakError::ReceiveTimeout {
                    addr: self.addr.clone(),
                    timeout_ms: self.config.read_timeout_ms,
                })
            }
        }
    }

    /// Sends `request` and waits for its single response.
    pub async fn write_read<Req, Resp>(&mut self, request: &Req) -> Result<Resp>
    where
        Req: Message,
        Resp: Message,
    {
        self.send(request).await?;
        self.receive().await
    }

    /// Closes the transport. Calling it on an unconnected connection is a no-op.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!(addr = %self.addr, id = self.id, "Disconnected");
        }
    }

    /// Drops the transport without a graceful shutdown.
    ///
    /// Used when unread frames may still be in flight, e.g. an abandoned stream.
    pub fn reset(&mut self) {
        if self.stream.take().is_some() {
            debug!(addr = %self.addr, id = self.id, "Transport reset");
        }
    }

    async fn open(&self) -> Result<TcpStream> {
        let connect_timeout = self.config.connect_timeout();
        let mut stream =
            match time::timeout(connect_timeout, TcpStream::connect(self.addr.as_str())).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return Err(RiakError::ConnectFailure {
                        addr: self.addr.clone(),
                        reason: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(RiakError::ConnectFailure {
                        addr: self.addr.clone(),
                        reason: format!("timed out after {}ms", self.config.connect_timeout_ms),
                    })
                }
            };

        stream.set_nodelay(true).map_err(|e| RiakError::ConnectFailure {
            addr: self.addr.clone(),
            reason: e.to_string(),
        })?;

        debug!(addr = %self.addr, id = self.id, "Opened transport");

        if let Some(credentials) = &self.config.credentials {
            self.authenticate(&mut stream, credentials).await?;
        }

        Ok(stream)
    }

    async fn authenticate(&self, stream: &mut TcpStream, credentials: &Credentials) -> Result<()> {
        let request = AuthReq {
            user: credentials.username.clone(),
            password: credentials.password.clone(),
        };

        time::timeout(self.config.write_timeout(), codec::write_frame(&mut *stream, &request))
            .await
            .map_err(|_| RiakError::SendTimeout {
                addr: self.addr.clone(),
                timeout_ms: self.config.write_timeout_ms,
            })??;

        let _: AuthResp = time::timeout(self.config.read_timeout(), codec::decode(&mut *stream))
            .await
            .map_err(|_| RiakError::ReceiveTimeout {
                addr: self.addr.clone(),
                timeout_ms: self.config.read_timeout_ms,
            })??;

        debug!(addr = %self.addr, user = %credentials.username, "Authenticated");
        Ok(())
    }

    fn fault(&mut self) {
        self.faulted = true;
        self.reset();
    }

    /// Converts I/O errors into the lost-connection variant where the peer is gone.
    fn map_io_error(&self, err: io::Error) -> RiakError {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => RiakError::ConnectionClosed(self.addr.clone()),
            _ => RiakError::Io(err),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("connected", &self.stream.is_some())
            .field("faulted", &self.faulted)
            .finish()
    }
}
