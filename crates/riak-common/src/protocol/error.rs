use std::fmt;
use std::io;

use thiserror::Error;

use crate::protocol::messages::MessageCode;

/// Coarse classification every failure is reduced to before it reaches a caller.
///
/// The cluster's retry loop only ever branches on these codes, never on the
/// concrete transport error underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Well-formed rejection sent by the server. Never retried.
    ServerError,
    /// Transport level trouble talking to a node. Retried, may deactivate the node.
    CommunicationError,
    /// No connection could be checked out of a node's pool. Retried.
    NoConnections,
    /// Every node is offline.
    ClusterOffline,
    /// The retry budget was exhausted before any attempt could run.
    NoRetries,
    /// The cluster is being disposed.
    ShuttingDown,
    /// The peer sent something that does not decode (protocol desync).
    InvalidResponse,
    /// The request could not be encoded or the configuration is unusable.
    InvalidRequest,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug)]
pub enum RiakError {
    #[error("Unable to connect to remote server {addr}: {reason}")]
    ConnectFailure { addr: String, reason: String },

    #[error("Failed to send data to server {addr} - timed out after {timeout_ms}ms")]
    SendTimeout { addr: String, timeout_ms: u64 },

    #[error("Unable to read data from {addr} - timed out after {timeout_ms}ms")]
    ReceiveTimeout { addr: String, timeout_ms: u64 },

    #[error("Connection to {0} was closed by the peer")]
    ConnectionClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("Unknown message code {0}")]
    UnknownCode(u8),

    #[error("Attempt to decode message to type '{expected}' when received type '{actual}'")]
    TypeMismatch {
        expected: MessageCode,
        actual: MessageCode,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Connection pool exhausted after waiting {0}ms")]
    PoolExhausted(u64),

    #[error("Communication error: {message}")]
    Communication { message: String, node_offline: bool },

    #[error("No connections available: {0}")]
    NoConnections(String),

    #[error("Unable to access functioning Riak node")]
    ClusterOffline,

    #[error("Unable to access a connection on the cluster")]
    NoRetries,

    #[error("System currently shutting down")]
    ShuttingDown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RiakError {
    /// The coarse code the retry loop branches on.
    pub fn result_code(&self) -> ResultCode {
        match self {
            RiakError::ConnectFailure { .. }
            | RiakError::SendTimeout { .. }
            | RiakError::ReceiveTimeout { .. }
            | RiakError::ConnectionClosed(_)
            | RiakError::Io(_)
            | RiakError::Communication { .. } => ResultCode::CommunicationError,
            RiakError::PoolExhausted(_) | RiakError::NoConnections(_) => ResultCode::NoConnections,
            RiakError::Server { .. } => ResultCode::ServerError,
            RiakError::UnknownCode(_)
            | RiakError::TypeMismatch { .. }
            | RiakError::InvalidResponse(_)
            | RiakError::Decoding(_) => ResultCode::InvalidResponse,
            RiakError::Encoding(_) | RiakError::InvalidConfig(_) => ResultCode::InvalidRequest,
            RiakError::ClusterOffline => ResultCode::ClusterOffline,
            RiakError::NoRetries => ResultCode::NoRetries,
            RiakError::ShuttingDown => ResultCode::ShuttingDown,
        }
    }

    /// Whether the failure is attributed to a node going offline rather than
    /// to this one request.
    pub fn node_offline(&self) -> bool {
        match self {
            RiakError::Communication { node_offline, .. } => *node_offline,
            RiakError::ClusterOffline | RiakError::ShuttingDown => true,
            _ => false,
        }
    }

    /// Raw transport faults, before the node boundary reclassifies them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RiakError::ConnectFailure { .. }
                | RiakError::SendTimeout { .. }
                | RiakError::ReceiveTimeout { .. }
                | RiakError::ConnectionClosed(_)
                | RiakError::Io(_)
        )
    }

    /// Faults that show the peer is gone, as opposed to slow.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            RiakError::ConnectFailure { .. } | RiakError::ConnectionClosed(_) => true,
            RiakError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RiakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_faults_are_communication_errors() {
        let errors = [
            RiakError::ConnectFailure {
                addr: "a:1".into(),
                reason: "refused".into(),
            },
            RiakError::SendTimeout {
                addr: "a:1".into(),
                timeout_ms: 10,
            },
            RiakError::ReceiveTimeout {
                addr: "a:1".into(),
                timeout_ms: 10,
            },
            RiakError::ConnectionClosed("a:1".into()),
            RiakError::Io(io::Error::new(io::ErrorKind::Other, "boom")),
        ];

        for err in errors {
            assert!(err.is_transport(), "{err} should be a transport fault");
            assert_eq!(err.result_code(), ResultCode::CommunicationError);
        }
    }

    #[test]
    fn test_server_error_is_not_retryable_class() {
        let err = RiakError::Server {
            code: 0,
            message: "not found".into(),
        };
        assert_eq!(err.result_code(), ResultCode::ServerError);
        assert!(!err.node_offline());
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "Server error 0: not found");
    }

    #[test]
    fn test_protocol_desync_is_invalid_response() {
        assert_eq!(RiakError::UnknownCode(77).result_code(), ResultCode::InvalidResponse);
        let mismatch = RiakError::TypeMismatch {
            expected: MessageCode::PingResp,
            actual: MessageCode::GetResp,
        };
        assert_eq!(mismatch.result_code(), ResultCode::InvalidResponse);
        assert_eq!(
            mismatch.to_string(),
            "Attempt to decode message to type 'PingResp' when received type 'GetResp'"
        );
    }

    #[test]
    fn test_pool_exhaustion_maps_to_no_connections() {
        assert_eq!(RiakError::PoolExhausted(100).result_code(), ResultCode::NoConnections);
        assert_eq!(
            RiakError::NoConnections("x".into()).result_code(),
            ResultCode::NoConnections
        );
    }

    #[test]
    fn test_node_offline_flag() {
        let offline = RiakError::Communication {
            message: "reset".into(),
            node_offline: true,
        };
        let online = RiakError::Communication {
            message: "slow".into(),
            node_offline: false,
        };
        assert!(offline.node_offline());
        assert!(!online.node_offline());
        assert!(RiakError::ClusterOffline.node_offline());
        assert!(!RiakError::NoRetries.node_offline());
    }

    #[test]
    fn test_connection_loss_kinds() {
        assert!(RiakError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).is_connection_loss());
        assert!(RiakError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)).is_connection_loss());
        assert!(!RiakError::Io(io::Error::from(io::ErrorKind::TimedOut)).is_connection_loss());
        assert!(!RiakError::ReceiveTimeout {
            addr: "a:1".into(),
            timeout_ms: 1
        }
        .is_connection_loss());
    }
}
