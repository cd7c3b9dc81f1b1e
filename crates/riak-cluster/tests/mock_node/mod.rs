//! In-process mock Riak node for cluster integration tests.
//!
//! Speaks the framed protocol over a real loopback socket: ping, server
//! info, streamed key listings and optional authentication. A node can be
//! taken down and brought back without releasing its port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use riak_common::transport::codec;
use riak_common::{
    AuthReq, AuthResp, ErrorResp, GetServerInfoResp, ListKeysReq, ListKeysResp, MessageCode,
    PingResp,
};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Bucket name for which the mock answers a key listing with an error frame.
pub const MISSING_BUCKET: &str = "missing";

/// Bucket name for which the mock sends one page and then hangs up.
pub const TRUNCATED_BUCKET: &str = "truncated";

pub const KEYS_PER_PAGE: usize = 2;

struct MockState {
    online: AtomicBool,
    accepted: AtomicUsize,
    requests: AtomicUsize,
    key_pages: usize,
    credentials: Option<(String, String)>,
}

pub struct MockNode {
    port: u16,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockNode {
    pub async fn start() -> Self {
        Self::build(3, None).await
    }

    /// A node whose key listings span `pages` pages before the final one.
    pub async fn with_key_pages(pages: usize) -> Self {
        Self::build(pages, None).await
    }

    /// A node that requires `AuthReq` with these credentials on every connection.
    pub async fn with_credentials(username: &str, password: &str) -> Self {
        Self::build(3, Some((username.to_string(), password.to_string()))).await
    }

    async fn build(key_pages: usize, credentials: Option<(String, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(MockState {
            online: AtomicBool::new(true),
            accepted: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            key_pages,
            credentials,
        });

        let task = {
            let state = state.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    if !state.online.load(Ordering::SeqCst) {
                        drop(stream);
                        continue;
                    }
                    state.accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, state.clone()));
                }
            })
        };

        Self { port, state, task }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Offline nodes drop new and existing connections without replying.
    pub fn set_online(&self, online: bool) {
        self.state.online.store(online, Ordering::SeqCst);
    }

    /// Connections accepted while online.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Request frames answered, authentication excluded.
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_frame(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; codec::HEADER_SIZE];
    stream.read_exact(&mut header).await.ok()?;
    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let mut payload = vec![0u8; length.saturating_sub(1)];
    stream.read_exact(&mut payload).await.ok()?;
    Some((header[codec::LENGTH_SIZE], payload))
}

async fn serve(mut stream: TcpStream, state: Arc<MockState>) {
    if let Some((username, password)) = &state.credentials {
        let Some((code, payload)) = read_frame(&mut stream).await else {
            return;
        };
        let accepted = code == MessageCode::AuthReq.as_u8()
            && codec::decode_payload::<AuthReq>(&payload)
                .map(|auth| &auth.user == username && &auth.password == password)
                .unwrap_or(false);
        if !accepted {
            let _ = codec::write_frame(
                &mut stream,
                &ErrorResp {
                    errmsg: "Authentication failed".into(),
                    errcode: 0,
                },
            )
            .await;
            return;
        }
        if codec::write_frame(&mut stream, &AuthResp).await.is_err() {
            return;
        }
    }

    while let Some((code, payload)) = read_frame(&mut stream).await {
        if !state.online.load(Ordering::SeqCst) {
            return;
        }
        state.requests.fetch_add(1, Ordering::SeqCst);

        let written = match MessageCode::try_from(code) {
            Ok(MessageCode::PingReq) => codec::write_frame(&mut stream, &PingResp).await,
            Ok(MessageCode::GetServerInfoReq) => {
                let info = GetServerInfoResp {
                    node: Some("riak@127.0.0.1".into()),
                    server_version: Some("3.2.0".into()),
                };
                codec::write_frame(&mut stream, &info).await
            }
            Ok(MessageCode::ListKeysReq) => {
                let request: ListKeysReq = codec::decode_payload(&payload).unwrap_or_default();
                if request.bucket == TRUNCATED_BUCKET {
                    let page = ListKeysResp {
                        keys: vec![format!("{}_0", request.bucket)],
                        done: false,
                    };
                    let _ = codec::write_frame(&mut stream, &page).await;
                    return;
                }
                list_keys(&mut stream, &state, &request.bucket).await
            }
            _ => {
                let error = ErrorResp {
                    errmsg: format!("Unknown message code: {code}"),
                    errcode: 0,
                };
                codec::write_frame(&mut stream, &error).await
            }
        };

        if written.is_err() {
            return;
        }
    }
}

async fn list_keys(
    stream: &mut TcpStream,
    state: &MockState,
    bucket: &str,
) -> riak_common::Result<()> {
    if bucket == MISSING_BUCKET {
        let error = ErrorResp {
            errmsg: format!("bucket {bucket} not found"),
            errcode: 1,
        };
        return codec::write_frame(stream, &error).await;
    }

    for page in 0..state.key_pages {
        let keys = (0..KEYS_PER_PAGE)
            .map(|i| format!("{bucket}_{}", page * KEYS_PER_PAGE + i))
            .collect();
        codec::write_frame(stream, &ListKeysResp { keys, done: false }).await?;
    }

    codec::write_frame(
        stream,
        &ListKeysResp {
            keys: Vec::new(),
            done: true,
        },
    )
    .await
}
