use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rtkrelay_bus::RegisterBus;
use tracing::debug;

/// Battery state of charge.
pub trait BatteryGauge {
    /// Charge in percent, or -1 when unavailable.
    fn percentage(&mut self) -> i32;
}

/// No battery fitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBattery;

impl BatteryGauge for NoBattery {
    fn percentage(&mut self) -> i32 {
        -1
    }
}

/// Reads a kernel power-supply `capacity` attribute.
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    path: PathBuf,
}

impl SysfsBattery {
    /// `path` is the `capacity` file, e.g.
    /// `/sys/class/power_supply/BAT0/capacity`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BatteryGauge for SysfsBattery {
    fn percentage(&mut self) -> i32 {
        match fs::read_to_string(&self.path) {
            Ok(text) => text
                .trim()
                .parse::<i32>()
                .map(|pct| pct.clamp(0, 100))
                .unwrap_or(-1),
            Err(err) => {
                debug!(path = ?self.path, error = %err, "battery read failed");
                -1
            }
        }
    }
}

/// MAX17048 state-of-charge register.
const REG_SOC: u8 = 0x04;

/// Default MAX17048 address.
pub const FUEL_GAUGE_ADDRESS: u16 = 0x36;

/// MAX17048 fuel gauge on the receiver's bus.
///
/// The SOC register holds whole percent in the high byte and 1/256 percent
/// in the low byte.
pub struct FuelGauge<B> {
    bus: B,
    timeout: Duration,
}

impl<B: RegisterBus> FuelGauge<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            timeout: rtkrelay_bus::DEFAULT_TIMEOUT,
        }
    }
}

impl<B: RegisterBus> BatteryGauge for FuelGauge<B> {
    fn percentage(&mut self) -> i32 {
        let mut soc = [0u8; 2];
        match self.bus.write_read(REG_SOC, &mut soc, self.timeout) {
            Ok(()) => {
                let pct = f64::from(soc[0]) + f64::from(soc[1]) / 256.0;
                (pct.round() as i32).clamp(0, 100)
            }
            Err(err) => {
                debug!(error = %err, "fuel gauge read failed");
                -1
            }
        }
    }
}
