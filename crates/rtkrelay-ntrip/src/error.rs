use std::io::ErrorKind;

/// Errors that can occur in caster session operations.
#[derive(Debug, thiserror::Error)]
pub enum NtripError {
    /// The caster host name could not be resolved.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// The TCP connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The caster answered the mountpoint request with something other than
    /// an acceptance.
    #[error("caster rejected request: {0}")]
    Rejected(String),

    /// The caster closed the connection.
    #[error("connection closed by caster")]
    Closed,

    /// A receive was attempted without a live session.
    #[error("no active session")]
    NotStreaming,

    /// The client configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred on the session socket.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NtripError {
    /// True for errors caused by a timeout rather than a broken session.
    pub fn is_transient(&self) -> bool {
        match self {
            NtripError::Io(err) | NtripError::Connect { source: err, .. } => {
                matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NtripError>;
