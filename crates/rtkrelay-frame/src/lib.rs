//! UBX frame resynchronization and NAV-PVT position decoding.
//!
//! The receiver emits a byte stream that reaches us in arbitrary chunks. Every
//! UBX frame on that stream carries:
//! - A 2-byte sync marker (0xB5 0x62)
//! - A 1-byte class, a 1-byte id and a 2-byte little-endian payload length
//! - The payload followed by a 2-byte Fletcher checksum
//!
//! [`FrameDecoder`] accumulates the chunks, recovers from noise and returns
//! decoded [`PositionFix`] values. Callers never see partial frames.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod fix;

pub use codec::{
    checksum, encode_frame, probe_frame, FrameHeader, CHECKSUM_SIZE, CLASS_NAV, HEADER_SIZE,
    ID_NAV_PVT, NAV_PVT_LEN, SYNC,
};
pub use decoder::{DecoderConfig, DecoderStats, FrameDecoder};
pub use error::{FrameError, Result};
pub use fix::{CarrierSolution, FixQuality, PositionFix, UtcTime};
