//! Windowed register transport for u-blox receivers on an addressable bus.
//!
//! The receiver exposes three registers over its DDC (I2C) port:
//! - 0xFD / 0xFE: big-endian count of bytes waiting to be read
//! - 0xFF: the data stream, read for receiver output and written for input
//!
//! [`BusTransport`] implements the read/available/write contract over any
//! [`RegisterBus`]. On Linux, [`I2cDevice`] provides the raw bus through
//! `/dev/i2c-N`.

pub mod error;
pub mod traits;
pub mod transport;

#[cfg(target_os = "linux")]
pub mod i2c;

pub use error::{BusError, Result};
pub use traits::RegisterBus;
pub use transport::{
    BusConfig, BusTransport, DEFAULT_ADDRESS, DEFAULT_TIMEOUT, NO_DATA_SENTINEL, REG_DATA,
    REG_LEN_HIGH, REG_LEN_LOW,
};

#[cfg(target_os = "linux")]
pub use i2c::I2cDevice;
