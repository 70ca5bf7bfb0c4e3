use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Result;
use crate::traits::RegisterBus;

/// High byte of the bytes-available count.
pub const REG_LEN_HIGH: u8 = 0xFD;
/// Low byte of the bytes-available count.
pub const REG_LEN_LOW: u8 = 0xFE;
/// Data stream register (read and write).
pub const REG_DATA: u8 = 0xFF;

/// Bytes-available value the receiver reports when it has nothing to say.
pub const NO_DATA_SENTINEL: u16 = 0xFFFF;

/// Default 7-bit device address of u-blox receivers.
pub const DEFAULT_ADDRESS: u16 = 0x42;

/// Per-transaction timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Where the receiver lives and how long a transaction may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Bus device node.
    pub device: PathBuf,
    /// 7-bit device address.
    pub address: u16,
    /// Per-transaction timeout.
    pub timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/i2c-1"),
            address: DEFAULT_ADDRESS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Receiver transport over a [`RegisterBus`].
///
/// Every call is a single bounded transaction. Timeouts surface as
/// transient errors; retry policy belongs to the caller.
pub struct BusTransport<B> {
    bus: B,
    timeout: Duration,
}

impl<B: RegisterBus> BusTransport<B> {
    /// Create a transport with the default transaction timeout.
    pub fn new(bus: B) -> Self {
        Self::with_timeout(bus, DEFAULT_TIMEOUT)
    }

    /// Create a transport with an explicit transaction timeout.
    pub fn with_timeout(bus: B, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    /// Number of bytes the receiver has waiting.
    ///
    /// The 0xFFFF sentinel is reported as 0.
    pub fn available(&mut self) -> Result<usize> {
        let mut len_bytes = [0u8; 2];
        self.bus.write_read(REG_LEN_HIGH, &mut len_bytes, self.timeout)?;

        let available = u16::from_be_bytes(len_bytes);
        if available == NO_DATA_SENTINEL {
            return Ok(0);
        }
        Ok(available as usize)
    }

    /// Read up to `buf.len()` waiting bytes from the data stream.
    ///
    /// Returns `Ok(0)` without touching the data register when nothing is
    /// waiting.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.available()?;
        if available == 0 || buf.is_empty() {
            return Ok(0);
        }

        let to_read = available.min(buf.len());
        self.bus.write_read(REG_DATA, &mut buf[..to_read], self.timeout)?;
        trace!(available, read = to_read, "read receiver output");
        Ok(to_read)
    }

    /// Write raw bytes to the data stream.
    ///
    /// No framing or length prefix is added; the receiver consumes input at
    /// its own pace.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.bus.write(data, self.timeout)?;
        trace!(len = data.len(), "wrote receiver input");
        Ok(data.len())
    }

    /// Verify the receiver answers on the bus.
    pub fn probe(&mut self) -> Result<usize> {
        let available = self.available()?;
        debug!(available, "receiver responded");
        Ok(available)
    }

    /// Transaction timeout in use.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Borrow the underlying bus.
    pub fn get_ref(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the underlying bus.
    pub fn get_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consume the transport and return the bus.
    pub fn into_inner(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::error::BusError;

    /// In-memory receiver exposing the DDC register window.
    #[derive(Default)]
    struct FakeReceiver {
        len_override: Option<u16>,
        outgoing: VecDeque<u8>,
        written: Vec<Vec<u8>>,
        data_reads: usize,
        fail_with_timeout: bool,
        timeouts_seen: Vec<Duration>,
    }

    impl RegisterBus for FakeReceiver {
        fn write_read(&mut self, register: u8, buf: &mut [u8], timeout: Duration) -> Result<()> {
            self.timeouts_seen.push(timeout);
            if self.fail_with_timeout {
                return Err(BusError::Timeout {
                    operation: "write_read",
                });
            }
            match register {
                REG_LEN_HIGH => {
                    let len = self
                        .len_override
                        .unwrap_or(self.outgoing.len().min(u16::MAX as usize - 1) as u16);
                    buf.copy_from_slice(&len.to_be_bytes()[..buf.len()]);
                }
                REG_DATA => {
                    self.data_reads += 1;
                    for slot in buf.iter_mut() {
                        *slot = self.outgoing.pop_front().unwrap_or(0xFF);
                    }
                }
                other => panic!("unexpected register {other:#04x}"),
            }
            Ok(())
        }

        fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
            self.timeouts_seen.push(timeout);
            if self.fail_with_timeout {
                return Err(BusError::Timeout { operation: "write" });
            }
            self.written.push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn available_reads_big_endian_count() {
        let mut transport = BusTransport::new(FakeReceiver {
            len_override: Some(0x0123),
            ..FakeReceiver::default()
        });
        assert_eq!(transport.available().unwrap(), 0x0123);
    }

    #[test]
    fn available_sentinel_normalizes_to_zero() {
        let mut transport = BusTransport::new(FakeReceiver {
            len_override: Some(NO_DATA_SENTINEL),
            ..FakeReceiver::default()
        });
        assert_eq!(transport.available().unwrap(), 0);
    }

    #[test]
    fn read_skips_transfer_when_nothing_waiting() {
        let mut transport = BusTransport::new(FakeReceiver::default());
        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
        assert_eq!(transport.get_ref().data_reads, 0);
    }

    #[test]
    fn read_is_bounded_by_available_and_buffer() {
        let mut transport = BusTransport::new(FakeReceiver {
            outgoing: (0u8..40).collect(),
            ..FakeReceiver::default()
        });

        let mut small = [0u8; 16];
        assert_eq!(transport.read(&mut small).unwrap(), 16);
        assert_eq!(small[0], 0);
        assert_eq!(small[15], 15);

        let mut large = [0u8; 64];
        assert_eq!(transport.read(&mut large).unwrap(), 24);
        assert_eq!(large[0], 16);
        assert_eq!(large[23], 39);
    }

    #[test]
    fn read_propagates_bus_errors() {
        let mut transport = BusTransport::new(FakeReceiver {
            fail_with_timeout: true,
            ..FakeReceiver::default()
        });
        let mut buf = [0u8; 8];
        let err = transport.read(&mut buf).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn write_passes_raw_bytes() {
        let mut transport = BusTransport::new(FakeReceiver::default());
        assert_eq!(transport.write(&[0xD3, 0x00, 0x13]).unwrap(), 3);
        assert_eq!(transport.get_ref().written, vec![vec![0xD3, 0x00, 0x13]]);
    }

    #[test]
    fn zero_length_write_is_noop() {
        let mut transport = BusTransport::new(FakeReceiver::default());
        assert_eq!(transport.write(&[]).unwrap(), 0);
        assert!(transport.get_ref().written.is_empty());
        assert!(transport.get_ref().timeouts_seen.is_empty());
    }

    #[test]
    fn every_transaction_uses_configured_timeout() {
        let timeout = Duration::from_millis(7);
        let mut transport = BusTransport::with_timeout(
            FakeReceiver {
                outgoing: VecDeque::from(vec![1, 2, 3]),
                ..FakeReceiver::default()
            },
            timeout,
        );
        let mut buf = [0u8; 8];
        transport.read(&mut buf).unwrap();
        transport.write(b"x").unwrap();
        assert!(transport
            .get_ref()
            .timeouts_seen
            .iter()
            .all(|seen| *seen == timeout));
        assert_eq!(transport.get_ref().timeouts_seen.len(), 3);
    }

    #[test]
    fn non_timeout_errors_are_not_transient() {
        let err = BusError::Io(std::io::Error::other("nack"));
        assert!(!err.is_transient());
        let err = BusError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(err.is_transient());
    }
}
