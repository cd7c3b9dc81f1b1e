use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use riak_common::protocol::error::{Result, RiakError};
use riak_common::transport::Connection;
use tokio::sync::Mutex;

use crate::pool::PooledConnection;

/// Something that can run an operation against a connection.
///
/// The operation borrows the connection for the duration of the returned
/// future. It is `Fn` rather than `FnOnce` because implementations that
/// retry may call it more than once.
pub trait Endpoint: Send + Sync {
    fn use_connection<T, F>(&self, op: F) -> impl Future<Output = Result<T>> + Send
    where
        T: Send + 'static,
        F: for<'c> Fn(&'c mut Connection) -> BoxFuture<'c, Result<T>> + Send + Sync;
}

/// Polls `fut`, turning a panic inside it into a communication error.
pub async fn run_guarded<T>(fut: BoxFuture<'_, Result<T>>) -> Result<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(RiakError::Communication {
            message: format!("operation panicked: {}", panic_message(panic.as_ref())),
            node_offline: false,
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// One connection held for a sequence of operations.
///
/// Operations run in call order on the same connection, with no node
/// selection and no retry. The connection goes back to its pool when the
/// endpoint is released or dropped.
///
/// An operation that fails with anything but a server error may have left
/// frames unread, so the transport is reset (the next operation reconnects)
/// and the connection is discarded at release.
pub struct PinnedEndpoint {
    conn: Mutex<PooledConnection>,
}

impl PinnedEndpoint {
    pub fn new(conn: PooledConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Address of the node the connection belongs to.
    pub async fn addr(&self) -> String {
        self.conn.lock().await.addr().to_string()
    }

    /// Checks the connection back in.
    pub fn release(self) {
        self.conn.into_inner().finish();
    }

    pub fn into_inner(self) -> PooledConnection {
        self.conn.into_inner()
    }
}

impl Endpoint for PinnedEndpoint {
    fn use_connection<T, F>(&self, op: F) -> impl Future<Output = Result<T>> + Send
    where
        T: Send + 'static,
        F: for<'c> Fn(&'c mut Connection) -> BoxFuture<'c, Result<T>> + Send + Sync,
    {
        async move {
            let mut conn = self.conn.lock().await;
            let result = run_guarded(op(&mut **conn)).await;
            if let Err(e) = &result {
                if !matches!(e, RiakError::Server { .. }) {
                    conn.reset();
                    conn.mark_unusable();
                }
            }
            result
        }
    }
}
