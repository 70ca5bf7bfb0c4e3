//! Unattended GNSS RTK rover.
//!
//! rtkrelay pulls RTCM corrections from an NTRIP caster, forwards them to a
//! u-blox receiver over I2C, decodes the receiver's NAV-PVT solutions and
//! keeps the wireless uplink alive without supervision.
//!
//! # Crate Structure
//!
//! - [`frame`]: UBX resynchronization and NAV-PVT decoding
//! - [`bus`]: receiver register transport over I2C
//! - [`ntrip`]: caster session client
//! - [`link`]: wireless network selection and recovery
//! - [`rover`]: the orchestration loop tying them together
//! - [`collab`]: battery, status indicator, telemetry and update collaborators

pub mod collab;
pub mod rover;

/// Re-export frame types.
pub mod frame {
    pub use rtkrelay_frame::*;
}

/// Re-export bus types.
pub mod bus {
    pub use rtkrelay_bus::*;
}

/// Re-export caster client types.
pub mod ntrip {
    pub use rtkrelay_ntrip::*;
}

/// Re-export link management types.
pub mod link {
    pub use rtkrelay_link::*;
}

pub use rover::{Rover, RoverConfig, Statistics, StatusClass};
