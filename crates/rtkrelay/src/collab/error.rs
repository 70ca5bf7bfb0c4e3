/// Errors raised by rover collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    /// An endpoint URL could not be used.
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: &'static str },

    /// A remote endpoint answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// A firmware update step failed.
    #[error("update failed: {0}")]
    Update(String),

    /// An HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollabError>;
