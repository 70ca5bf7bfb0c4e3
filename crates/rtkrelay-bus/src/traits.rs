use std::time::Duration;

use crate::error::Result;

/// Raw access to one device on an addressable bus.
///
/// Implementations perform exactly one bus transaction per call and never
/// retry. The device address is fixed at construction.
pub trait RegisterBus {
    /// Write `register`, then read `buf.len()` bytes in one combined
    /// transaction.
    fn write_read(&mut self, register: u8, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Write `data` to the device as-is.
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    fn write_read(&mut self, register: u8, buf: &mut [u8], timeout: Duration) -> Result<()> {
        (**self).write_read(register, buf, timeout)
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        (**self).write(data, timeout)
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for Box<T> {
    fn write_read(&mut self, register: u8, buf: &mut [u8], timeout: Duration) -> Result<()> {
        (**self).write_read(register, buf, timeout)
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        (**self).write(data, timeout)
    }
}
