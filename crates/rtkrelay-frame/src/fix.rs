use std::fmt;

use bytes::{Buf, BufMut};
use serde::Serialize;

use crate::codec::NAV_PVT_LEN;
use crate::error::{FrameError, Result};

/// Receiver-reported confidence class for the computed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixQuality {
    NoFix,
    DeadReckoning,
    TwoD,
    ThreeD,
    GnssDeadReckoning,
    TimeOnly,
    Unknown(u8),
}

impl FixQuality {
    /// Raw `fixType` code as sent by the receiver.
    pub fn code(self) -> u8 {
        match self {
            FixQuality::NoFix => 0,
            FixQuality::DeadReckoning => 1,
            FixQuality::TwoD => 2,
            FixQuality::ThreeD => 3,
            FixQuality::GnssDeadReckoning => 4,
            FixQuality::TimeOnly => 5,
            FixQuality::Unknown(code) => code,
        }
    }

    /// True when the receiver reports at least a 2D solution.
    pub fn is_at_least_2d(self) -> bool {
        self.code() >= 2
    }
}

impl From<u8> for FixQuality {
    fn from(code: u8) -> Self {
        match code {
            0 => FixQuality::NoFix,
            1 => FixQuality::DeadReckoning,
            2 => FixQuality::TwoD,
            3 => FixQuality::ThreeD,
            4 => FixQuality::GnssDeadReckoning,
            5 => FixQuality::TimeOnly,
            other => FixQuality::Unknown(other),
        }
    }
}

impl fmt::Display for FixQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FixQuality::NoFix => "No Fix",
            FixQuality::DeadReckoning => "Dead Reckoning",
            FixQuality::TwoD => "2D Fix",
            FixQuality::ThreeD => "3D Fix",
            FixQuality::GnssDeadReckoning => "GNSS + DR",
            FixQuality::TimeOnly => "Time Only",
            FixQuality::Unknown(_) => "Unknown",
        };
        f.write_str(label)
    }
}

/// Carrier-phase refinement state of a differential solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierSolution {
    None,
    Float,
    Fixed,
}

impl CarrierSolution {
    /// Extract `carrSoln` from bits 6-7 of the NAV-PVT flags byte.
    ///
    /// The reserved value 3 is reported as `None`.
    pub fn from_flags(flags: u8) -> Self {
        match (flags >> 6) & 0x03 {
            1 => CarrierSolution::Float,
            2 => CarrierSolution::Fixed,
            _ => CarrierSolution::None,
        }
    }

    /// Raw 2-bit code.
    pub fn code(self) -> u8 {
        match self {
            CarrierSolution::None => 0,
            CarrierSolution::Float => 1,
            CarrierSolution::Fixed => 2,
        }
    }
}

/// UTC timestamp of a solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UtcTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A decoded NAV-PVT solution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionFix {
    pub time: UtcTime,
    pub fix_quality: FixQuality,
    pub carrier_solution: CarrierSolution,
    pub satellites: u8,
    /// Degrees.
    pub latitude: f64,
    /// Degrees.
    pub longitude: f64,
    /// Meters above mean sea level.
    pub altitude_msl: f64,
    /// Meters.
    pub horizontal_accuracy: f64,
    /// Meters.
    pub vertical_accuracy: f64,
    /// Validity bit set and fix quality at least 2D.
    pub valid: bool,
}

const DEG_SCALE: f64 = 1e-7;
const MM_PER_M: f64 = 1000.0;

impl PositionFix {
    /// Decode a NAV-PVT payload. The payload must be exactly 92 bytes.
    pub fn from_nav_pvt(payload: &[u8]) -> Result<Self> {
        if payload.len() != NAV_PVT_LEN {
            return Err(FrameError::PayloadLength {
                expected: NAV_PVT_LEN,
                actual: payload.len(),
            });
        }

        let time = UtcTime {
            year: (&payload[4..6]).get_u16_le(),
            month: payload[6],
            day: payload[7],
            hour: payload[8],
            minute: payload[9],
            second: payload[10],
        };
        let valid_flags = payload[11];
        let fix_quality = FixQuality::from(payload[20]);
        let carrier_solution = CarrierSolution::from_flags(payload[21]);

        let lon_raw = (&payload[24..28]).get_i32_le();
        let lat_raw = (&payload[28..32]).get_i32_le();
        let alt_raw = (&payload[36..40]).get_i32_le();
        let h_acc_raw = (&payload[40..44]).get_u32_le();
        let v_acc_raw = (&payload[44..48]).get_u32_le();

        Ok(Self {
            time,
            fix_quality,
            carrier_solution,
            satellites: payload[23],
            latitude: f64::from(lat_raw) * DEG_SCALE,
            longitude: f64::from(lon_raw) * DEG_SCALE,
            altitude_msl: f64::from(alt_raw) / MM_PER_M,
            horizontal_accuracy: f64::from(h_acc_raw) / MM_PER_M,
            vertical_accuracy: f64::from(v_acc_raw) / MM_PER_M,
            valid: valid_flags & 0x01 != 0 && fix_quality.is_at_least_2d(),
        })
    }

    /// Encode this fix as a NAV-PVT payload.
    ///
    /// Fields not carried by [`PositionFix`] are zero. Used to build receiver
    /// captures for replay and tests.
    pub fn to_nav_pvt(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NAV_PVT_LEN);
        out.put_u32_le(0); // iTOW
        out.put_u16_le(self.time.year);
        out.put_slice(&[
            self.time.month,
            self.time.day,
            self.time.hour,
            self.time.minute,
            self.time.second,
            u8::from(self.valid),
        ]);
        out.put_bytes(0, 8); // tAcc, nano
        out.put_u8(self.fix_quality.code());
        out.put_u8(self.carrier_solution.code() << 6);
        out.put_u8(0); // flags2
        out.put_u8(self.satellites);
        out.put_i32_le((self.longitude / DEG_SCALE).round() as i32);
        out.put_i32_le((self.latitude / DEG_SCALE).round() as i32);
        out.put_i32_le(0); // height above ellipsoid
        out.put_i32_le((self.altitude_msl * MM_PER_M).round() as i32);
        out.put_u32_le((self.horizontal_accuracy * MM_PER_M).round() as u32);
        out.put_u32_le((self.vertical_accuracy * MM_PER_M).round() as u32);
        out.resize(NAV_PVT_LEN, 0);
        out
    }

    /// Human-readable solution label. Carrier solution takes precedence.
    pub fn solution_label(&self) -> String {
        match self.carrier_solution {
            CarrierSolution::Fixed => "RTK FIXED".to_string(),
            CarrierSolution::Float => "RTK FLOAT".to_string(),
            CarrierSolution::None => self.fix_quality.to_string(),
        }
    }
}
