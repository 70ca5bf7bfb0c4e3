/// Errors that can occur while probing or decoding UBX frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (expected {expected:02X?}, got {actual:02X?})")]
    ChecksumMismatch { expected: [u8; 2], actual: [u8; 2] },

    /// The declared payload length can never fit in the accumulator.
    #[error("declared frame size {size} exceeds limit {max}")]
    LengthOutOfRange { size: usize, max: usize },

    /// A payload is too large to be described by the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A message payload has the wrong length for its type.
    #[error("payload length {actual} does not match expected {expected}")]
    PayloadLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
