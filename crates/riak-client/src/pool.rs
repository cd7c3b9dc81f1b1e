use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use riak_common::protocol::error::{Result, RiakError};
use riak_common::transport::{Connection, ConnectionConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Connection pool configuration.
///
/// # Default Configuration
///
/// - `pool_size`: 30
/// - `acquire_timeout_ms`: 5000 (5 seconds)
///
/// # Example
///
/// ```rust
/// use riak_client::PoolConfig;
///
/// let config = PoolConfig {
///     pool_size: 8,
///     acquire_timeout_ms: 250,
/// };
/// assert_eq!(config.acquire_timeout().as_millis(), 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Hard ceiling on live connections to the node
    pub pool_size: usize,
    /// Maximum time a checkout waits for a connection to be checked in
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 30,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Bounded pool of connections to one node.
///
/// # Architecture
///
/// - A semaphore with `pool_size` permits bounds the number of checked-out
///   connections; a checkout holds one permit until the connection is back
/// - Idle connections sit in a LIFO stack and are handed out before a new
///   one is constructed, so idle plus checked out never exceeds `pool_size`
/// - Construction is free: a new [`Connection`] opens its socket on first use
/// - Faulted or unusable connections are dropped at checkin instead of being
///   recycled, which frees their slot for a fresh connection
///
/// Cloning the pool is cheap and shares the same state.
///
/// # Example
///
/// ```rust,no_run
/// use riak_client::{ConnectionPool, PoolConfig};
/// use riak_common::{ConnectionConfig, PingReq, PingResp};
///
/// # #[tokio::main]
/// # async fn main() -> riak_common::Result<()> {
/// let pool = ConnectionPool::new("127.0.0.1:8087", PoolConfig::default(), ConnectionConfig::default());
///
/// let mut conn = pool.checkout().await?;
/// let _pong: PingResp = conn.write_read(&PingReq).await?;
/// conn.finish();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    addr: String,
    config: PoolConfig,
    connection_config: ConnectionConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    disposed: AtomicBool,
}

impl PoolInner {
    fn reclaim(&self, conn: Connection, reusable: bool) {
        if !reusable || conn.is_faulted() || self.disposed.load(Ordering::Acquire) {
            debug!(addr = %self.addr, id = conn.id(), faulted = conn.is_faulted(), "Discarding connection");
            return;
        }
        self.idle.lock().push(conn);
    }
}

impl ConnectionPool {
    /// Creates an empty pool. No connection is opened until one is used.
    pub fn new(
        addr: impl Into<String>,
        config: PoolConfig,
        connection_config: ConnectionConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.pool_size));
        Self {
            inner: Arc::new(PoolInner {
                addr: addr.into(),
                config,
                connection_config,
                permits,
                idle: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    pub fn pool_size(&self) -> usize {
        self.inner.config.pool_size
    }

    /// Connections currently owned by the pool and ready for checkout.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Connections currently checked out to callers.
    pub fn in_use_count(&self) -> usize {
        self.inner
            .config
            .pool_size
            .saturating_sub(self.inner.permits.available_permits())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Checks out a connection for exclusive use.
    ///
    /// Returns the most recently checked-in idle connection, or a new one if
    /// none is idle and the ceiling allows it. At the ceiling, waits up to
    /// `acquire_timeout_ms` for a checkin.
    ///
    /// # Errors
    ///
    /// - [`RiakError::PoolExhausted`] if no connection frees up in time
    /// - [`RiakError::ShuttingDown`] if the pool has been disposed
    pub async fn checkout(&self) -> Result<PooledConnection> {
        if self.is_disposed() {
            return Err(RiakError::ShuttingDown);
        }

        let acquire = self.inner.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.inner.config.acquire_timeout(), acquire).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(RiakError::ShuttingDown),
            Err(_) => {
                debug!(
                    addr = %self.inner.addr,
                    pool_size = self.inner.config.pool_size,
                    "Connection pool exhausted"
                );
                return Err(RiakError::PoolExhausted(self.inner.config.acquire_timeout_ms));
            }
        };

        let idle = self.inner.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                let conn = Connection::new(
                    self.inner.addr.clone(),
                    self.inner.connection_config.clone(),
                );
                debug!(addr = %self.inner.addr, id = conn.id(), "Created pooled connection");
                conn
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            reusable: true,
            exchange_open: false,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Returns a connection to the pool.
    ///
    /// With `reusable == false` the connection is discarded instead of
    /// recycled. Dropping the guard is equivalent to `checkin(conn, true)`.
    pub fn checkin(&self, mut conn: PooledConnection, reusable: bool) {
        if !reusable {
            conn.mark_unusable();
        }
        drop(conn);
    }

    /// Disconnects every idle connection and refuses further checkouts.
    ///
    /// Connections still checked out are discarded when they come back.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();

        let idle = std::mem::take(&mut *self.inner.idle.lock());
        let count = idle.len();
        for mut conn in idle {
            conn.disconnect().await;
        }

        debug!(addr = %self.inner.addr, disconnected = count, "Disposed connection pool");
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("addr", &self.inner.addr)
            .field("pool_size", &self.inner.config.pool_size)
            .field("idle", &self.idle_count())
            .field("in_use", &self.in_use_count())
            .finish()
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Dereferences to [`Connection`]. Dropping the guard checks the connection
/// back in: it is recycled unless it faulted, was marked unusable, or the
/// pool was disposed meanwhile. The slot is released after the connection is
/// back in the idle set, so a waiting checkout always finds it.
///
/// While an exchange is open (see [`begin_exchange`](Self::begin_exchange))
/// dropping the guard also resets the transport, so response frames nobody
/// read never reach the next borrower.
pub struct PooledConnection {
    conn: Option<Connection>,
    reusable: bool,
    exchange_open: bool,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Flags the connection so it is discarded at checkin.
    pub fn mark_unusable(&mut self) {
        self.reusable = false;
    }

    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Marks a request as sent whose responses have not all been read yet.
    pub fn begin_exchange(&mut self) {
        self.exchange_open = true;
    }

    /// Marks the open exchange as fully read.
    pub fn end_exchange(&mut self) {
        self.exchange_open = false;
    }

    pub fn is_exchange_open(&self) -> bool {
        self.exchange_open
    }

    /// Checks the connection back in for reuse, with any exchange complete.
    pub fn finish(mut self) {
        self.exchange_open = false;
        drop(self);
    }

    /// Checks the connection back in and discards it.
    pub fn discard(mut self) {
        self.reusable = false;
        drop(self);
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("pooled connection accessed after checkin"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("pooled connection accessed after checkin"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if self.exchange_open {
                debug!(addr = %conn.addr(), id = conn.id(), "Exchange abandoned mid-flight");
                conn.reset();
            }
            self.pool.reclaim(conn, self.reusable);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("reusable", &self.reusable)
            .field("exchange_open", &self.exchange_open)
            .finish()
    }
}
