/// Errors that can occur in link management.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A network profile could not be parsed or is unusable.
    #[error("invalid network profile: {0}")]
    InvalidProfile(String),

    /// The radio backend reported a failure.
    #[error("radio error: {0}")]
    Radio(String),

    /// An external radio command exited unsuccessfully.
    #[error("{command} failed (status {status:?}): {stderr}")]
    CommandFailed {
        command: &'static str,
        status: Option<i32>,
        stderr: String,
    },

    /// A radio operation did not finish in time.
    #[error("radio {operation} timed out")]
    Timeout { operation: &'static str },

    /// An I/O error occurred talking to the radio.
    #[error("radio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
