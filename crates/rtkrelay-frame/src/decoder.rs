use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{probe_frame, CHECKSUM_SIZE, HEADER_SIZE, SYNC};
use crate::fix::PositionFix;

/// Default accumulator capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 256;

/// Default size past which an unresolved accumulator is discarded.
pub const DEFAULT_DESYNC_THRESHOLD: usize = 200;

/// Configuration for the frame decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Hard upper bound on buffered, unparsed bytes.
    pub capacity: usize,
    /// Buffered bytes past which the accumulator is cleared after a scan
    /// that produced no fix.
    pub desync_threshold: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            desync_threshold: DEFAULT_DESYNC_THRESHOLD,
        }
    }
}

/// Running counters describing decoder health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Checksummed frames consumed (any class).
    pub frames: u64,
    /// Sync markers rejected as false positives.
    pub rejected_syncs: u64,
    /// Accumulator clears caused by the desync safeguard.
    pub desync_resets: u64,
    /// Bytes dropped because the accumulator was full.
    pub truncated_bytes: u64,
}

/// Accumulates receiver bytes and yields decoded NAV-PVT fixes.
///
/// Feed it whatever the bus returned on each poll; frames split across any
/// number of calls are reassembled. Other frame types are consumed and
/// dropped.
pub struct FrameDecoder {
    buf: BytesMut,
    config: DecoderConfig,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Create a new decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a new decoder with explicit configuration.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.capacity),
            config,
            stats: DecoderStats::default(),
        }
    }

    /// Append `bytes` and return the first fix that becomes complete.
    ///
    /// Bytes that do not fit in the accumulator are dropped. Remaining fixes
    /// already buffered are returned by subsequent calls.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<PositionFix> {
        let room = self.config.capacity.saturating_sub(self.buf.len());
        let take = bytes.len().min(room);
        if take < bytes.len() {
            let dropped = (bytes.len() - take) as u64;
            self.stats.truncated_bytes += dropped;
            trace!(dropped, "accumulator full, truncating input");
        }
        self.buf.extend_from_slice(&bytes[..take]);

        if let Some(fix) = self.scan() {
            return Some(fix);
        }

        if self.buf.len() > self.config.desync_threshold {
            debug!(
                buffered = self.buf.len(),
                "no frame resolved, clearing accumulator"
            );
            self.stats.desync_resets += 1;
            self.buf.clear();
        }

        None
    }

    fn scan(&mut self) -> Option<PositionFix> {
        let mut offset = 0usize;

        while offset + HEADER_SIZE + CHECKSUM_SIZE <= self.buf.len() {
            if self.buf[offset..offset + SYNC.len()] != SYNC {
                offset += 1;
                continue;
            }

            let header = match probe_frame(&self.buf[offset..], self.config.capacity) {
                Ok(Some(header)) => header,
                Ok(None) => break, // Need more data
                Err(err) => {
                    trace!(offset, error = %err, "false sync marker");
                    self.stats.rejected_syncs += 1;
                    offset += 1;
                    continue;
                }
            };

            let end = offset + header.wire_size();
            let consumed = self.buf.split_to(end);
            self.stats.frames += 1;

            if header.is_nav_pvt() {
                let payload = &consumed[offset + HEADER_SIZE..end - CHECKSUM_SIZE];
                match PositionFix::from_nav_pvt(payload) {
                    Ok(fix) => return Some(fix),
                    Err(err) => debug!(error = %err, "NAV-PVT decode failed"),
                }
            } else {
                trace!(
                    class = header.class,
                    id = header.id,
                    len = header.payload_len,
                    "skipping frame"
                );
            }

            offset = 0;
        }

        None
    }

    /// Number of buffered, unparsed bytes.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop all buffered bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Decoder health counters.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, CLASS_NAV, ID_NAV_PVT};
    use crate::fix::{CarrierSolution, FixQuality, UtcTime};

    fn sample_fix() -> PositionFix {
        PositionFix {
            time: UtcTime {
                year: 2025,
                month: 3,
                day: 9,
                hour: 7,
                minute: 5,
                second: 1,
            },
            fix_quality: FixQuality::ThreeD,
            carrier_solution: CarrierSolution::Float,
            satellites: 17,
            latitude: 45.6471947,
            longitude: -122.4567891,
            altitude_msl: 61.25,
            horizontal_accuracy: 0.125,
            vertical_accuracy: 0.25,
            valid: true,
        }
    }

    fn nav_pvt_frame(fix: &PositionFix) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(CLASS_NAV, ID_NAV_PVT, &fix.to_nav_pvt(), &mut buf).unwrap();
        buf.to_vec()
    }

    fn other_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(class, id, payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn decodes_whole_frame() {
        let fix = sample_fix();
        let mut decoder = FrameDecoder::new();

        let decoded = decoder.feed(&nav_pvt_frame(&fix)).unwrap();
        assert!((decoded.latitude - 45.6471947).abs() < 1e-7);
        assert_eq!(decoded.carrier_solution, CarrierSolution::Float);
        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.feed(&[]).is_none());
    }

    #[test]
    fn frame_split_at_every_boundary_yields_exactly_once() {
        let fix = sample_fix();
        let wire = nav_pvt_frame(&fix);

        for split in 1..wire.len() {
            let mut decoder = FrameDecoder::new();
            let first = decoder.feed(&wire[..split]);
            assert!(first.is_none(), "split {split} decoded early");
            let second = decoder.feed(&wire[split..]);
            assert!(second.is_some(), "split {split} never decoded");
            assert!(decoder.feed(&[]).is_none());
        }
    }

    #[test]
    fn byte_by_byte_feed() {
        let wire = nav_pvt_frame(&sample_fix());
        let mut decoder = FrameDecoder::new();

        let decoded: Vec<PositionFix> = wire.iter().filter_map(|b| decoder.feed(&[*b])).collect();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn corrupt_checksum_is_rejected_and_decoder_resyncs() {
        let fix = sample_fix();
        for flip in [1usize, 2] {
            let mut wire = nav_pvt_frame(&fix);
            let idx = wire.len() - flip;
            wire[idx] ^= 0x5A;

            let mut decoder = FrameDecoder::new();
            assert!(decoder.feed(&wire).is_none());
            assert!(decoder.stats().rejected_syncs >= 1);

            // The next valid frame is still found behind the rejected bytes.
            let good = decoder.feed(&nav_pvt_frame(&fix));
            assert!(good.is_some());
            assert_eq!(decoder.buffered(), 0);
        }
    }

    #[test]
    fn non_target_frames_are_consumed() {
        let mut wire = other_frame(0x0A, 0x04, b"");
        wire.extend(other_frame(0x01, 0x03, &[0u8; 16]));
        wire.extend(nav_pvt_frame(&sample_fix()));

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&wire).is_some());
        assert_eq!(decoder.stats().frames, 3);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn nav_pvt_with_wrong_length_is_skipped() {
        let mut wire = other_frame(CLASS_NAV, ID_NAV_PVT, &[0u8; 84]);
        wire.extend(nav_pvt_frame(&sample_fix()));

        let mut decoder = FrameDecoder::new();
        let fix = decoder.feed(&wire).unwrap();
        assert_eq!(fix.satellites, 17);
    }

    #[test]
    fn two_fixes_in_one_chunk_are_returned_on_consecutive_calls() {
        let mut first = sample_fix();
        first.satellites = 10;
        let mut second = sample_fix();
        second.satellites = 11;

        let mut wire = nav_pvt_frame(&first);
        wire.extend(nav_pvt_frame(&second));

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(&wire).unwrap().satellites, 10);
        assert_eq!(decoder.feed(&[]).unwrap().satellites, 11);
        assert!(decoder.feed(&[]).is_none());
    }

    #[test]
    fn noise_before_frame_is_discarded_with_it() {
        let mut wire = vec![0x00, 0xB5, 0x13, 0x62, 0xFF];
        wire.extend(nav_pvt_frame(&sample_fix()));

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&wire).is_some());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn unresolved_bytes_past_threshold_clear_accumulator() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&[0x55; 150]).is_none());
        assert_eq!(decoder.buffered(), 150);

        assert!(decoder.feed(&[0x55; 51]).is_none());
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.stats().desync_resets, 1);
    }

    #[test]
    fn oversized_length_field_does_not_stall() {
        // Sync + NAV class with a declared length of 0xFFFF.
        let mut wire = vec![0xB5, 0x62, 0x01, 0x07, 0xFF, 0xFF, 0x00, 0x00];
        wire.extend(nav_pvt_frame(&sample_fix()));

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(&wire).is_some());
        assert_eq!(decoder.stats().rejected_syncs, 1);
    }

    #[test]
    fn input_beyond_capacity_is_truncated() {
        let mut decoder = FrameDecoder::with_config(DecoderConfig {
            capacity: 64,
            desync_threshold: 200,
        });
        assert!(decoder.feed(&[0u8; 100]).is_none());
        assert_eq!(decoder.buffered(), 64);
        assert_eq!(decoder.stats().truncated_bytes, 36);
    }

    #[test]
    fn partial_frame_waits_for_more_data() {
        let wire = nav_pvt_frame(&sample_fix());
        let mut decoder = FrameDecoder::new();

        assert!(decoder.feed(&wire[..50]).is_none());
        assert_eq!(decoder.buffered(), 50);
        assert!(decoder.feed(&wire[50..]).is_some());
    }
}
