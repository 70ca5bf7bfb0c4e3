use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: sync (2) + class (1) + id (1) + length (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Trailing Fletcher checksum: ck_a (1) + ck_b (1).
pub const CHECKSUM_SIZE: usize = 2;

/// Sync marker: 0xB5 0x62 ("µb").
pub const SYNC: [u8; 2] = [0xB5, 0x62];

/// Navigation message class.
pub const CLASS_NAV: u8 = 0x01;

/// Position/velocity/time solution message id.
pub const ID_NAV_PVT: u8 = 0x07;

/// Exact NAV-PVT payload length.
pub const NAV_PVT_LEN: usize = 92;

/// Parsed header of a complete, checksummed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Message class.
    pub class: u8,
    /// Message id within the class.
    pub id: u8,
    /// Declared payload length.
    pub payload_len: usize,
}

impl FrameHeader {
    /// The total wire size of the frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload_len + CHECKSUM_SIZE
    }

    /// True for a NAV-PVT frame with the exact expected payload length.
    pub fn is_nav_pvt(&self) -> bool {
        self.class == CLASS_NAV && self.id == ID_NAV_PVT && self.payload_len == NAV_PVT_LEN
    }
}

/// Compute the 8-bit Fletcher checksum used by UBX.
///
/// Covers class, id, length and payload. `ck_b` accumulates the running
/// value of `ck_a`, so byte order matters.
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let mut ck_a = 0u8;
    let mut ck_b = 0u8;
    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    [ck_a, ck_b]
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────┬────┬───────────┬─────────────┬──────────┐
/// │ Sync (2B) │ Class │ Id │ Length    │ Payload     │ ck_a ck_b│
/// │ 0xB5 0x62 │ (1B)  │(1B)│ (2B LE)   │ (Length B)  │ (2B)     │
/// └───────────┴───────┴────┴───────────┴─────────────┴──────────┘
/// ```
pub fn encode_frame(class: u8, id: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u16::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    let body_start = dst.len() + SYNC.len();
    dst.put_slice(&SYNC);
    dst.put_u8(class);
    dst.put_u8(id);
    dst.put_u16_le(payload.len() as u16);
    dst.put_slice(payload);
    let ck = checksum(&dst[body_start..]);
    dst.put_slice(&ck);
    Ok(())
}

/// Probe for a complete frame at the start of `src`.
///
/// `src` must begin with the sync marker. Returns `Ok(None)` if more data is
/// needed. A frame that could never fit in `max_frame` bytes is rejected
/// before any payload byte is indexed.
pub fn probe_frame(src: &[u8], max_frame: usize) -> Result<Option<FrameHeader>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header = FrameHeader {
        class: src[2],
        id: src[3],
        payload_len: u16::from_le_bytes([src[4], src[5]]) as usize,
    };

    let total = header.wire_size();
    if total > max_frame {
        return Err(FrameError::LengthOutOfRange {
            size: total,
            max: max_frame,
        });
    }
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let body_end = HEADER_SIZE + header.payload_len;
    let expected = checksum(&src[SYNC.len()..body_end]);
    let actual = [src[body_end], src[body_end + 1]];
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(Some(header))
}
