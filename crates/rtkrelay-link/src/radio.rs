use std::time::Duration;

use crate::error::Result;
use crate::profile::{NetworkProfile, ScanResult};
use crate::state::LinkEvent;

/// Association changes reported by a radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    Connected { identifier: String },
    Disconnected { reason: String },
}

impl From<RadioEvent> for LinkEvent {
    fn from(event: RadioEvent) -> Self {
        match event {
            RadioEvent::Connected { identifier } => LinkEvent::Connected { identifier },
            RadioEvent::Disconnected { reason } => LinkEvent::Disconnected { reason },
        }
    }
}

/// Wireless station capability driven by the connectivity manager.
pub trait Radio {
    /// Bring the radio up. Called once before the first scan.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Scan for access points.
    fn scan(&mut self) -> Result<Vec<ScanResult>>;

    /// Begin joining `profile`. The outcome arrives through
    /// [`Radio::poll_event`]; an error means the attempt never started.
    fn connect(&mut self, profile: &NetworkProfile) -> Result<()>;

    /// Wait up to `timeout` for the next association change.
    fn poll_event(&mut self, timeout: Duration) -> Option<RadioEvent>;
}

impl<R: Radio + ?Sized> Radio for Box<R> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn scan(&mut self) -> Result<Vec<ScanResult>> {
        (**self).scan()
    }

    fn connect(&mut self, profile: &NetworkProfile) -> Result<()> {
        (**self).connect(profile)
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<RadioEvent> {
        (**self).poll_event(timeout)
    }
}
