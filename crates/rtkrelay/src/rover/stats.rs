use serde::Serialize;

use rtkrelay_frame::{CarrierSolution, PositionFix};

/// Running rover counters. Only the orchestrator writes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Correction bytes received from the caster.
    pub correction_bytes_received: u64,
    /// Correction bytes written to the receiver.
    pub correction_bytes_forwarded: u64,
    /// Position fixes decoded.
    pub fixes_decoded: u64,
    /// Fixes with a fixed carrier-phase solution.
    pub fixed_count: u64,
    /// Fixes with a float carrier-phase solution.
    pub float_count: u64,
}

impl Statistics {
    pub(crate) fn record_fix(&mut self, fix: &PositionFix) {
        self.fixes_decoded += 1;
        match fix.carrier_solution {
            CarrierSolution::Fixed => self.fixed_count += 1,
            CarrierSolution::Float => self.float_count += 1,
            CarrierSolution::None => {}
        }
    }

    /// Share of carrier-phase solutions that were fixed, in percent.
    ///
    /// `None` until at least one float or fixed solution has been seen.
    pub fn fixed_rate(&self) -> Option<f64> {
        let total = self.fixed_count + self.float_count;
        if total == 0 {
            return None;
        }
        Some(100.0 * self.fixed_count as f64 / total as f64)
    }
}
