use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::connector::{CorrectionStream, StreamConnector, TcpConnector};
use crate::error::{NtripError, Result};
use crate::handshake::{build_request, parse_response};

/// Default caster port.
pub const DEFAULT_PORT: u16 = 2101;

/// Configuration for a caster session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Caster host name or address.
    pub host: String,
    /// Caster TCP port.
    pub port: u16,
    /// Mountpoint to request, without the leading slash.
    pub mountpoint: String,
    /// Optional caster account.
    pub credentials: Option<Credentials>,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Bound on name resolution and TCP connect.
    pub connect_timeout: Duration,
    /// Bound on each handshake send and receive.
    pub io_timeout: Duration,
    /// Read timeout while streaming; a read that times out returns no data.
    pub poll_timeout: Duration,
    /// Silence after which a streaming session is considered stale.
    pub stale_timeout: Duration,
    /// Size of the buffer used to read the handshake response.
    pub max_response: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            mountpoint: String::new(),
            credentials: None,
            user_agent: format!("NTRIP rtkrelay/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_millis(100),
            stale_timeout: Duration::from_secs(15),
            max_response: 512,
        }
    }
}

impl ClientConfig {
    /// Check the fields a request cannot be built without.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(NtripError::InvalidConfig("caster host is empty".to_string()));
        }
        if self.mountpoint.is_empty() {
            return Err(NtripError::InvalidConfig("mountpoint is empty".to_string()));
        }
        if self.mountpoint.contains(char::is_whitespace) {
            return Err(NtripError::InvalidConfig(format!(
                "mountpoint {:?} contains whitespace",
                self.mountpoint
            )));
        }
        if self.poll_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err(NtripError::InvalidConfig(
                "socket timeouts must be non-zero".to_string(),
            ));
        }
        if self.max_response == 0 {
            return Err(NtripError::InvalidConfig(
                "max_response must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a caster session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Streaming,
}

/// Client for one correction stream.
///
/// All calls are blocking but bounded by the configured timeouts. Any
/// failure while connecting or streaming leaves the client `Disconnected`
/// with its socket released; `connect` may then be called again.
pub struct CorrectionClient<C: StreamConnector = TcpConnector> {
    config: ClientConfig,
    connector: C,
    stream: Option<C::Stream>,
    state: SessionState,
    last_activity: Instant,
    bytes_received: u64,
    pending: Vec<u8>,
    last_status: Option<String>,
}

impl CorrectionClient<TcpConnector> {
    /// Create a client that connects over TCP.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: StreamConnector> CorrectionClient<C> {
    /// Create a client with a custom stream connector.
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            stream: None,
            state: SessionState::Disconnected,
            last_activity: Instant::now(),
            bytes_received: 0,
            pending: Vec::new(),
            last_status: None,
        }
    }

    /// Open a session and perform the mountpoint request.
    ///
    /// A no-op when already streaming.
    pub fn connect(&mut self) -> Result<()> {
        if self.state == SessionState::Streaming {
            return Ok(());
        }
        self.config.validate()?;

        self.state = SessionState::Connecting;
        match self.open_session() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = SessionState::Streaming;
                self.last_activity = Instant::now();
                info!(
                    host = %self.config.host,
                    mountpoint = %self.config.mountpoint,
                    "correction stream started"
                );
                Ok(())
            }
            Err(err) => {
                warn!(host = %self.config.host, error = %err, "caster connect failed");
                self.close();
                Err(err)
            }
        }
    }

    fn open_session(&mut self) -> Result<C::Stream> {
        info!(
            host = %self.config.host,
            port = self.config.port,
            mountpoint = %self.config.mountpoint,
            authenticated = self.config.credentials.is_some(),
            "connecting to caster"
        );

        let mut stream = self.connector.connect(
            &self.config.host,
            self.config.port,
            self.config.connect_timeout,
        )?;
        stream.set_read_timeout(Some(self.config.io_timeout))?;
        stream.set_write_timeout(Some(self.config.io_timeout))?;

        let request = build_request(&self.config);
        stream.write_all(request.as_bytes())?;
        stream.flush()?;

        let mut chunk = vec![0u8; self.config.max_response];
        let n = loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Err(NtripError::Closed),
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };

        let response = parse_response(&chunk[..n]);
        debug!(status = %response.status_line, "caster response");
        self.last_status = Some(response.status_line.clone());
        if !response.accepted {
            let _ = stream.shutdown();
            return Err(NtripError::Rejected(response.status_line));
        }

        stream.set_read_timeout(Some(self.config.poll_timeout))?;
        self.pending = response.body;
        Ok(stream)
    }

    /// Read correction bytes into `buf`.
    ///
    /// Returns `Ok(0)` when the poll timeout passed without data. An error
    /// means the session has ended and the client is `Disconnected`.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.state != SessionState::Streaming {
            return Err(NtripError::NotStreaming);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if !self.pending.is_empty() {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            self.record(n);
            return Ok(n);
        }

        let Some(stream) = self.stream.as_mut() else {
            self.close();
            return Err(NtripError::NotStreaming);
        };

        match stream.read(buf) {
            Ok(0) => {
                warn!("caster closed the correction stream");
                self.close();
                Err(NtripError::Closed)
            }
            Ok(n) => {
                self.record(n);
                Ok(n)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => {
                warn!(error = %err, "correction stream read failed");
                self.close();
                Err(err.into())
            }
        }
    }

    fn record(&mut self, n: usize) {
        self.bytes_received += n as u64;
        self.last_activity = Instant::now();
    }

    /// True when streaming but no data has arrived within the stale timeout.
    pub fn is_stale(&self) -> bool {
        self.state == SessionState::Streaming
            && self.last_activity.elapsed() > self.config.stale_timeout
    }

    /// Tear the session down if it has gone stale. Returns true if it did.
    pub fn check_stale(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        warn!(
            silent_for = ?self.last_activity.elapsed(),
            "correction stream stale, disconnecting"
        );
        self.close();
        true
    }

    /// Close the session. Idempotent.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            info!(host = %self.config.host, "disconnecting from caster");
        }
        self.close();
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown();
        }
        self.pending.clear();
        self.state = SessionState::Disconnected;
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while a session is streaming.
    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Total correction bytes received across all sessions.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Status line of the most recent caster response.
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    /// Time since correction data last arrived.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl<C: StreamConnector> Drop for CorrectionClient<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;

    #[derive(Default)]
    struct Script {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        read_timeouts: Vec<Option<Duration>>,
        shutdowns: usize,
    }

    /// Stream replaying scripted reads.
    #[derive(Clone, Default)]
    struct ScriptedStream(Arc<Mutex<Script>>);

    impl ScriptedStream {
        fn with_reads(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            let stream = Self::default();
            stream.0.lock().unwrap().reads = reads.into();
            stream
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut script = self.0.lock().unwrap();
            match script.reads.pop_front() {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::from(ErrorKind::WouldBlock)),
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CorrectionStream for ScriptedStream {
        fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
            self.0.lock().unwrap().read_timeouts.push(timeout);
            Ok(())
        }

        fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&self) -> io::Result<()> {
            self.0.lock().unwrap().shutdowns += 1;
            Ok(())
        }
    }

    struct ScriptedConnector {
        streams: VecDeque<Result<ScriptedStream>>,
        attempts: usize,
    }

    impl ScriptedConnector {
        fn new(streams: Vec<Result<ScriptedStream>>) -> Self {
            Self {
                streams: streams.into(),
                attempts: 0,
            }
        }
    }

    impl StreamConnector for ScriptedConnector {
        type Stream = ScriptedStream;

        fn connect(
            &mut self,
            host: &str,
            _port: u16,
            _timeout: Duration,
        ) -> Result<ScriptedStream> {
            self.attempts += 1;
            self.streams.pop_front().unwrap_or_else(|| {
                Err(NtripError::Connect {
                    addr: host.to_string(),
                    source: io::Error::from(ErrorKind::ConnectionRefused),
                })
            })
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            host: "caster.example".to_string(),
            mountpoint: "BASE01".to_string(),
            ..ClientConfig::default()
        }
    }

    fn accepted_stream(rest: Vec<io::Result<Vec<u8>>>) -> ScriptedStream {
        let mut reads = vec![Ok(b"ICY 200 OK\r\n\r\n".to_vec())];
        reads.extend(rest);
        ScriptedStream::with_reads(reads)
    }

    #[test]
    fn connect_and_stream() {
        let stream = accepted_stream(vec![Ok(vec![0xD3, 0x00, 0x02, 0xAA, 0xBB])]);
        let handle = stream.clone();
        let mut client =
            CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![Ok(stream)]));

        client.connect().unwrap();
        assert_eq!(client.state(), SessionState::Streaming);
        assert_eq!(client.last_status(), Some("ICY 200 OK"));

        let mut buf = [0u8; 1024];
        assert_eq!(client.receive(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[0xD3, 0x00, 0x02, 0xAA, 0xBB]);
        assert_eq!(client.bytes_received(), 5);

        // Poll timeout yields no data but keeps the session.
        assert_eq!(client.receive(&mut buf).unwrap(), 0);
        assert!(client.is_streaming());

        let script = handle.0.lock().unwrap();
        let request = String::from_utf8(script.written.clone()).unwrap();
        assert!(request.starts_with("GET /BASE01 HTTP/1.1\r\n"));
        assert_eq!(
            script.read_timeouts.last().copied().flatten(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn connect_while_streaming_is_noop() {
        let connector = ScriptedConnector::new(vec![Ok(accepted_stream(vec![]))]);
        let mut client = CorrectionClient::with_connector(config(), connector);
        client.connect().unwrap();
        client.connect().unwrap();
        assert_eq!(client.connector.attempts, 1);
    }

    #[test]
    fn body_in_handshake_chunk_is_delivered_first() {
        let mut first = b"ICY 200 OK\r\n\r\n".to_vec();
        first.extend_from_slice(&[1, 2, 3]);
        let stream = ScriptedStream::with_reads(vec![Ok(first), Ok(vec![4, 5])]);
        let mut client =
            CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![Ok(stream)]));
        client.connect().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(client.receive(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(client.receive(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[test]
    fn rejected_request_leaves_client_disconnected() {
        let stream =
            ScriptedStream::with_reads(vec![Ok(b"HTTP/1.1 401 Unauthorized\r\n\r\n".to_vec())]);
        let handle = stream.clone();
        let mut client =
            CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![Ok(stream)]));

        let err = client.connect().unwrap_err();
        assert!(matches!(
            err,
            NtripError::Rejected(ref line) if line == "HTTP/1.1 401 Unauthorized"
        ));
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(handle.0.lock().unwrap().shutdowns >= 1);
    }

    #[test]
    fn close_during_handshake_is_an_error() {
        let stream = ScriptedStream::with_reads(vec![Ok(Vec::new())]);
        let mut client =
            CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![Ok(stream)]));
        assert!(matches!(client.connect(), Err(NtripError::Closed)));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[test]
    fn connect_failure_leaves_client_disconnected() {
        let mut client = CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![]));
        assert!(matches!(client.connect(), Err(NtripError::Connect { .. })));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[test]
    fn remote_close_while_streaming_disconnects() {
        let stream = accepted_stream(vec![Ok(Vec::new())]);
        let mut client =
            CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![Ok(stream)]));
        client.connect().unwrap();

        let mut buf = [0u8; 16];
        assert!(matches!(client.receive(&mut buf), Err(NtripError::Closed)));
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(matches!(client.receive(&mut buf), Err(NtripError::NotStreaming)));
    }

    #[test]
    fn read_error_while_streaming_disconnects() {
        let stream = accepted_stream(vec![Err(io::Error::from(ErrorKind::ConnectionReset))]);
        let mut client =
            CorrectionClient::with_connector(config(), ScriptedConnector::new(vec![Ok(stream)]));
        client.connect().unwrap();

        let mut buf = [0u8; 16];
        assert!(matches!(client.receive(&mut buf), Err(NtripError::Io(_))));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[test]
    fn silent_session_goes_stale() {
        let cfg = ClientConfig {
            stale_timeout: Duration::from_millis(20),
            ..config()
        };
        let mut client = CorrectionClient::with_connector(
            cfg,
            ScriptedConnector::new(vec![Ok(accepted_stream(vec![]))]),
        );
        client.connect().unwrap();
        assert!(!client.is_stale());
        assert!(!client.check_stale());

        thread::sleep(Duration::from_millis(40));
        assert!(client.is_stale());
        assert!(client.check_stale());
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(!client.is_stale());
    }

    #[test]
    fn disconnected_client_is_never_stale() {
        let cfg = ClientConfig {
            stale_timeout: Duration::ZERO,
            ..config()
        };
        let client = CorrectionClient::with_connector(cfg, ScriptedConnector::new(vec![]));
        assert!(!client.is_stale());
    }

    #[test]
    fn reconnect_after_failure() {
        let mut client = CorrectionClient::with_connector(
            config(),
            ScriptedConnector::new(vec![
                Ok(ScriptedStream::with_reads(vec![Ok(b"HTTP/1.1 503 Busy\r\n\r\n".to_vec())])),
                Ok(accepted_stream(vec![])),
            ]),
        );
        assert!(client.connect().is_err());
        client.connect().unwrap();
        assert!(client.is_streaming());
    }

    #[test]
    fn invalid_config_is_rejected_before_connecting() {
        let cfg = ClientConfig {
            mountpoint: String::new(),
            ..config()
        };
        let mut client = CorrectionClient::with_connector(cfg, ScriptedConnector::new(vec![]));
        assert!(matches!(client.connect(), Err(NtripError::InvalidConfig(_))));
        assert_eq!(client.connector.attempts, 0);
    }

    #[test]
    fn config_debug_redacts_password() {
        let cfg = ClientConfig {
            credentials: Credentials::new("rover", "hunter2"),
            ..config()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn session_over_loopback_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.ends_with(b"\r\n\r\n") {
                let n = conn.read(&mut buf).unwrap();
                assert!(n > 0);
                request.extend_from_slice(&buf[..n]);
            }
            conn.write_all(b"ICY 200 OK\r\n\r\n").unwrap();
            conn.write_all(&[0xD3, 0x00, 0x00, 0x47, 0xEA, 0x4B]).unwrap();
            String::from_utf8(request).unwrap()
        });

        let cfg = ClientConfig {
            host: "127.0.0.1".to_string(),
            port,
            mountpoint: "LOOP".to_string(),
            credentials: Credentials::new("rover", "secret"),
            ..ClientConfig::default()
        };
        let mut client = CorrectionClient::new(cfg);
        client.connect().unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        let deadline = Instant::now() + Duration::from_secs(5);
        while received.len() < 6 && Instant::now() < deadline {
            match client.receive(&mut buf) {
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(NtripError::Closed) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(received, vec![0xD3, 0x00, 0x00, 0x47, 0xEA, 0x4B]);

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /LOOP HTTP/1.1\r\nHost: 127.0.0.1\r\n"));
        assert!(request.contains("Authorization: Basic cm92ZXI6c2VjcmV0\r\n"));
    }
}
