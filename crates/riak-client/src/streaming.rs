use futures::stream::{self, BoxStream, StreamExt};
use riak_common::protocol::error::Result;
use riak_common::protocol::messages::Message;

use crate::pool::PooledConnection;

/// A checked-out connection with response frames still in flight.
///
/// The exchange stays open on the connection until the final frame or an
/// error is read, so dropping the stream early resets the transport before
/// the connection goes back to the idle set.
struct InFlight<F> {
    conn: PooledConnection,
    is_done: F,
}

/// Reads a multi-frame response off `conn` as a stream of `T`.
///
/// The request must already have been sent. Each item is one response frame;
/// the stream ends after the first frame for which `is_done` returns true, or
/// after the first error. The connection is checked back in exactly once:
/// when the stream ends, or when the stream is dropped early.
///
/// # Example
///
/// ```rust,no_run
/// use futures::TryStreamExt;
/// use riak_client::{stream_responses, ConnectionPool, PoolConfig};
/// use riak_common::{ConnectionConfig, ListKeysReq, ListKeysResp};
///
/// # #[tokio::main]
/// # async fn main() -> riak_common::Result<()> {
/// let pool = ConnectionPool::new("127.0.0.1:8087", PoolConfig::default(), ConnectionConfig::default());
/// let mut conn = pool.checkout().await?;
/// conn.send(&ListKeysReq { bucket: "users".into(), ..Default::default() }).await?;
///
/// let pages: Vec<ListKeysResp> = stream_responses(conn, |page: &ListKeysResp| page.done)
///     .try_collect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn stream_responses<T, F>(mut conn: PooledConnection, is_done: F) -> BoxStream<'static, Result<T>>
where
    T: Message,
    F: Fn(&T) -> bool + Send + 'static,
{
    conn.begin_exchange();
    let flight = InFlight { conn, is_done };

    stream::unfold(Some(flight), |state| async move {
        let mut flight = state?;
        match flight.conn.receive::<T>().await {
            Ok(response) => {
                if (flight.is_done)(&response) {
                    flight.conn.end_exchange();
                    Some((Ok(response), None))
                } else {
                    Some((Ok(response), Some(flight)))
                }
            }
            Err(e) => {
                // faulted connections are discarded at checkin, server errors end the exchange cleanly
                flight.conn.end_exchange();
                Some((Err(e), None))
            }
        }
    })
    .boxed()
}
