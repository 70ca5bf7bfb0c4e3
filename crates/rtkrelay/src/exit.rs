use std::fmt;
use std::io;

use rtkrelay::bus::BusError;
use rtkrelay::collab::CollabError;
use rtkrelay::link::LinkError;
use rtkrelay::ntrip::NtripError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn bus_error(context: &str, err: BusError) -> CliError {
    match err {
        BusError::Open { source, .. } if source.kind() != io::ErrorKind::NotFound => {
            io_error(context, source)
        }
        BusError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        BusError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn ntrip_error(context: &str, err: NtripError) -> CliError {
    match err {
        NtripError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        NtripError::Rejected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        NtripError::Connect { source, .. } | NtripError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::InvalidProfile(_) => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::Io(source) => io_error(context, source),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn collab_error(context: &str, err: CollabError) -> CliError {
    match err {
        CollabError::InvalidEndpoint { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        CollabError::Io(source) => io_error(context, source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
