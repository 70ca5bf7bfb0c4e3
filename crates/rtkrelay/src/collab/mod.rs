//! Collaborators the rover drives but does not own the semantics of.

pub mod battery;
pub mod error;
pub mod indicator;
pub mod telemetry;
pub mod update;

pub use battery::{BatteryGauge, FuelGauge, NoBattery, SysfsBattery, FUEL_GAUGE_ADDRESS};
pub use error::{CollabError, Result};
pub use indicator::{LogIndicator, StatusColor, StatusIndicator};
pub use telemetry::{
    parse_endpoint, HttpTelemetry, NoTelemetry, TelemetryReport, TelemetryReporter,
};
pub use update::{spawn_update_loop, CommandUpdater, FirmwareUpdater, UpdateSchedule};
