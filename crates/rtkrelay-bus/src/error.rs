use std::io::ErrorKind;
use std::path::PathBuf;

/// Errors that can occur in bus transport operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Failed to open the bus device.
    #[error("failed to open bus device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to select the target device address.
    #[error("failed to select address {address:#04x}: {source}")]
    Address {
        address: u16,
        source: std::io::Error,
    },

    /// A transaction did not complete within its timeout.
    #[error("bus {operation} timed out")]
    Timeout { operation: &'static str },

    /// An I/O error occurred on the bus.
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// True for errors that are expected to clear on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            BusError::Timeout { .. } => true,
            BusError::Io(err) => matches!(
                err.kind(),
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
