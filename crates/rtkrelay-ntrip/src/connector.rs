use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{NtripError, Result};

/// Byte stream a correction session runs over.
pub trait CorrectionStream: Read + Write {
    /// Bound every subsequent read. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Bound every subsequent write.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close both directions.
    fn shutdown(&self) -> io::Result<()>;
}

impl CorrectionStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Opens streams to a caster.
pub trait StreamConnector {
    type Stream: CorrectionStream;

    /// Resolve `host` and open a stream, giving up after `timeout`.
    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<Self::Stream>;
}

/// TCP connector with bounded name resolution and connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl StreamConnector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        let addrs = resolve(host, port, timeout)?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, "tcp connected");
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "tcp connect attempt failed");
                    last_err = Some((addr, err));
                }
            }
        }

        Err(match last_err {
            Some((addr, source)) => NtripError::Connect {
                addr: addr.to_string(),
                source,
            },
            None => NtripError::Resolve {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
            },
        })
    }
}

/// Resolve on a helper thread so a hung resolver cannot outlast `timeout`.
///
/// The helper is left to finish on its own when the deadline passes.
fn resolve(host: &str, port: u16, timeout: Duration) -> Result<Vec<SocketAddr>> {
    let (tx, rx) = mpsc::channel();
    let target = host.to_string();
    thread::Builder::new()
        .name("rtkrelay-resolve".to_string())
        .spawn(move || {
            let result = (target.as_str(), port)
                .to_socket_addrs()
                .map(|addrs| addrs.collect::<Vec<_>>());
            let _ = tx.send(result);
        })
        .map_err(|source| NtripError::Resolve {
            host: host.to_string(),
            source,
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(addrs)) if !addrs.is_empty() => Ok(addrs),
        Ok(Ok(_)) => Err(NtripError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        }),
        Ok(Err(source)) => Err(NtripError::Resolve {
            host: host.to_string(),
            source,
        }),
        Err(_) => Err(NtripError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::TimedOut, "name resolution timed out"),
        }),
    }
}
