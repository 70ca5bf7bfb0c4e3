use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{BusError, Result};
use crate::traits::RegisterBus;
use crate::transport::{BusConfig, BusTransport};

// From <linux/i2c-dev.h> and <linux/i2c.h>.
const I2C_TIMEOUT: libc::c_ulong = 0x0702;
const I2C_SLAVE: libc::c_ulong = 0x0703;
const I2C_RDWR: libc::c_ulong = 0x0707;
const I2C_M_RD: u16 = 0x0001;

/// Kernel timeout unit for `I2C_TIMEOUT` (10 ms jiffies).
const TIMEOUT_UNIT_MS: u128 = 10;

#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// One device on a Linux `i2c-dev` bus.
pub struct I2cDevice {
    file: File,
    path: PathBuf,
    address: u16,
    timeout: Option<Duration>,
}

impl I2cDevice {
    /// Open `/dev/i2c-N` and bind it to a 7-bit device address.
    pub fn open(path: impl AsRef<Path>, address: u16) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| BusError::Open {
                path: path.clone(),
                source,
            })?;

        // SAFETY: `file` is an open i2c-dev descriptor; I2C_SLAVE takes the
        // address by value.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            return Err(BusError::Address {
                address,
                source: std::io::Error::last_os_error(),
            });
        }

        info!(?path, address, "opened i2c device");

        Ok(Self {
            file,
            path,
            address,
            timeout: None,
        })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 7-bit device address.
    pub fn address(&self) -> u16 {
        self.address
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.timeout == Some(timeout) {
            return Ok(());
        }
        let units = timeout.as_millis().div_ceil(TIMEOUT_UNIT_MS).max(1);
        let units = libc::c_ulong::try_from(units).unwrap_or(libc::c_ulong::MAX);

        // SAFETY: `file` is an open i2c-dev descriptor; I2C_TIMEOUT takes the
        // timeout by value.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_TIMEOUT as _, units) };
        if rc < 0 {
            return Err(BusError::Io(std::io::Error::last_os_error()));
        }
        debug!(?timeout, "set i2c adapter timeout");
        self.timeout = Some(timeout);
        Ok(())
    }
}

fn transfer_len(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        BusError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("transfer of {len} bytes exceeds i2c message limit"),
        ))
    })
}

fn classify(operation: &'static str, err: std::io::Error) -> BusError {
    if err.kind() == std::io::ErrorKind::TimedOut || err.raw_os_error() == Some(libc::ETIMEDOUT) {
        BusError::Timeout { operation }
    } else {
        BusError::Io(err)
    }
}

impl RegisterBus for I2cDevice {
    fn write_read(&mut self, register: u8, buf: &mut [u8], timeout: Duration) -> Result<()> {
        self.apply_timeout(timeout)?;
        let read_len = transfer_len(buf.len())?;
        let mut reg = [register];

        let mut msgs = [
            I2cMsg {
                addr: self.address,
                flags: 0,
                len: 1,
                buf: reg.as_mut_ptr(),
            },
            I2cMsg {
                addr: self.address,
                flags: I2C_M_RD,
                len: read_len,
                buf: buf.as_mut_ptr(),
            },
        ];
        let mut data = I2cRdwrData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };

        // SAFETY: both message buffers outlive the call and their lengths
        // match the declared `len` fields.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_RDWR as _,
                &mut data as *mut I2cRdwrData,
            )
        };
        if rc < 0 {
            return Err(classify("write_read", std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        self.apply_timeout(timeout)?;
        transfer_len(data.len())?;
        self.file
            .write_all(data)
            .map_err(|err| classify("write", err))
    }
}

impl BusTransport<I2cDevice> {
    /// Open the configured device and wrap it in a transport.
    pub fn open(config: &BusConfig) -> Result<Self> {
        let device = I2cDevice::open(&config.device, config.address)?;
        Ok(Self::with_timeout(device, config.timeout))
    }
}

impl std::fmt::Debug for I2cDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cDevice")
            .field("path", &self.path)
            .field("address", &format_args!("{:#04x}", self.address))
            .finish()
    }
}
