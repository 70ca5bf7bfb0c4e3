//! NTRIP caster client.
//!
//! Opens a TCP session to a caster, performs the HTTP-style mountpoint
//! request, and then streams RTCM correction bytes with short polling reads.
//! The session tracks its own liveness: read errors and orderly closes drop
//! it to `Disconnected`, and a session that stops delivering data is
//! reported stale.

pub mod auth;
pub mod client;
pub mod connector;
pub mod error;
pub mod handshake;

pub use auth::{base64_encode, Credentials};
pub use client::{ClientConfig, CorrectionClient, SessionState, DEFAULT_PORT};
pub use connector::{CorrectionStream, StreamConnector, TcpConnector};
pub use error::{NtripError, Result};
pub use handshake::{build_request, parse_response, HandshakeResponse};
