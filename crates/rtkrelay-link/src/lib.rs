//! Wireless link management for unattended rovers.
//!
//! [`ConnectivityManager`] scans for known networks, joins the strongest
//! one, retries on loss and falls back to a rescan once retries run out.
//! Radio events drive a pure transition table ([`transition`]); the
//! manager performs the resulting actions against a [`Radio`] and publishes
//! the outcome through a cheap, cloneable [`ConnectivityHandle`].

pub mod error;
pub mod manager;
pub mod nmcli;
pub mod profile;
pub mod radio;
pub mod state;

pub use error::{LinkError, Result};
pub use manager::{ConnectivityHandle, ConnectivityManager, LinkConfig};
pub use nmcli::NmcliRadio;
pub use profile::{select, AuthMethod, NetworkProfile, ScanResult};
pub use radio::{Radio, RadioEvent};
pub use state::{transition, Action, ConnectivityState, LinkEvent, RetryPolicy, Transition};
