//! NetworkManager radio backend driven through `nmcli`.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{LinkError, Result};
use crate::profile::{AuthMethod, NetworkProfile, ScanResult};
use crate::radio::{Radio, RadioEvent};

const NMCLI: &str = "nmcli";

/// Radio backed by the system NetworkManager.
///
/// Association changes are detected by polling the active connection at
/// `status_interval`.
pub struct NmcliRadio {
    interface: Option<String>,
    command_timeout: Duration,
    status_interval: Duration,
    associated: Option<String>,
    last_status: Option<Instant>,
    events: VecDeque<RadioEvent>,
}

impl NmcliRadio {
    /// Manage the default wireless device.
    pub fn new() -> Self {
        Self {
            interface: None,
            command_timeout: Duration::from_secs(30),
            status_interval: Duration::from_secs(2),
            associated: None,
            last_status: None,
            events: VecDeque::new(),
        }
    }

    /// Restrict all operations to one interface.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Bound on each `nmcli` invocation.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn ifname_args(&self) -> Vec<&str> {
        match &self.interface {
            Some(name) => vec!["ifname", name.as_str()],
            None => Vec::new(),
        }
    }

    fn active_network(&self) -> Result<Option<String>> {
        let output = run(
            &["-t", "-f", "ACTIVE,SSID", "device", "wifi", "list"],
            &self.ifname_args(),
            None,
            self.command_timeout,
            "status",
        )?;
        Ok(output.lines().find_map(|line| {
            let fields = split_terse(line);
            match fields.as_slice() {
                [active, ssid] if active == "yes" && !ssid.is_empty() => Some(ssid.clone()),
                _ => None,
            }
        }))
    }

    fn refresh_status(&mut self) {
        let active = match self.active_network() {
            Ok(active) => active,
            Err(err) => {
                debug!(error = %err, "status query failed");
                return;
            }
        };

        match (self.associated.clone(), active) {
            (Some(expected), Some(actual)) if expected == actual => {}
            (Some(_), None) => {
                self.associated = None;
                self.events.push_back(RadioEvent::Disconnected {
                    reason: "association lost".to_string(),
                });
            }
            (_, Some(actual)) => {
                self.associated = Some(actual.clone());
                self.events
                    .push_back(RadioEvent::Connected { identifier: actual });
            }
            (None, None) => {}
        }
    }
}

impl Default for NmcliRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for NmcliRadio {
    fn start(&mut self) -> Result<()> {
        run(&["radio", "wifi", "on"], &[], None, self.command_timeout, "start")?;
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ScanResult>> {
        let output = run(
            &[
                "-t", "-f", "SSID,SIGNAL,SECURITY", "device", "wifi", "list", "--rescan", "yes",
            ],
            &self.ifname_args(),
            None,
            self.command_timeout,
            "scan",
        )?;
        Ok(output.lines().filter_map(parse_scan_line).collect())
    }

    fn connect(&mut self, profile: &NetworkProfile) -> Result<()> {
        // `--ask` makes nmcli read the passphrase from stdin.
        let args = ["--ask", "device", "wifi", "connect", profile.identifier()];
        let result = run(
            &args,
            &self.ifname_args(),
            Some(profile.credential()),
            self.command_timeout,
            "connect",
        );
        match result {
            Ok(_) => {
                self.associated = Some(profile.identifier().to_string());
                self.events.push_back(RadioEvent::Connected {
                    identifier: profile.identifier().to_string(),
                });
            }
            Err(err) => {
                self.associated = None;
                self.events.push_back(RadioEvent::Disconnected {
                    reason: err.to_string(),
                });
            }
        }
        self.last_status = Some(Instant::now());
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<RadioEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }

        let due = self
            .last_status
            .is_none_or(|at| at.elapsed() >= self.status_interval);
        if due {
            self.last_status = Some(Instant::now());
            self.refresh_status();
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
        }

        thread::sleep(timeout);
        None
    }
}

/// Run `nmcli` with a deadline, returning stdout.
///
/// Arguments are never logged. Secrets travel on stdin, never in argv.
fn run(
    args: &[&str],
    extra: &[&str],
    secret: Option<&str>,
    timeout: Duration,
    operation: &'static str,
) -> Result<String> {
    run_program(NMCLI, args, extra, secret, timeout, operation)
}

fn run_program(
    program: &str,
    args: &[&str],
    extra: &[&str],
    secret: Option<&str>,
    timeout: Duration,
    operation: &'static str,
) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .args(extra)
        .stdin(if secret.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Readers drain both pipes so a chatty child never stalls on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    if let (Some(secret), Some(mut stdin)) = (secret, child.stdin.take()) {
        let written = stdin
            .write_all(secret.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"));
        if let Err(err) = written {
            debug!(operation, error = %err, "nmcli closed stdin early");
        }
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(LinkError::Timeout { operation });
        }
        thread::sleep(Duration::from_millis(50));
    };

    let stdout = collect(stdout);
    trace!(operation, bytes = stdout.len(), "nmcli finished");

    if !status.success() {
        return Err(LinkError::CommandFailed {
            command: operation,
            status: status.code(),
            stderr: collect(stderr).trim().to_string(),
        });
    }

    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut raw = Vec::new();
            let _ = pipe.read_to_end(&mut raw);
            String::from_utf8_lossy(&raw).into_owned()
        })
    })
}

fn collect(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Split one line of `nmcli -t` output on unescaped colons.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = vec![String::new()];
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    if let Some(field) = fields.last_mut() {
                        field.push(escaped);
                    }
                }
            }
            ':' => fields.push(String::new()),
            other => {
                if let Some(field) = fields.last_mut() {
                    field.push(other);
                }
            }
        }
    }
    fields
}

fn parse_scan_line(line: &str) -> Option<ScanResult> {
    let fields = split_terse(line);
    let [ssid, signal, security] = fields.as_slice() else {
        return None;
    };
    if ssid.is_empty() {
        return None; // Hidden network
    }
    let percent: i16 = signal.trim().parse().ok()?;
    Some(ScanResult {
        identifier: ssid.clone(),
        rssi: percent_to_dbm(percent),
        auth: parse_security(security),
    })
}

/// NetworkManager reports signal quality in percent.
fn percent_to_dbm(percent: i16) -> i16 {
    percent.clamp(0, 100) / 2 - 100
}

fn parse_security(security: &str) -> AuthMethod {
    let tokens: Vec<&str> = security.split_whitespace().collect();
    let has = |name: &str| tokens.iter().any(|t| *t == name);

    if tokens.is_empty() || security.trim() == "--" {
        AuthMethod::Open
    } else if has("802.1X") {
        if has("WPA2") || has("WPA3") {
            AuthMethod::Wpa2Enterprise
        } else {
            AuthMethod::Unknown
        }
    } else if has("WPA2") && has("WPA3") {
        AuthMethod::Wpa2Wpa3Psk
    } else if has("WPA3") {
        AuthMethod::Wpa3Psk
    } else if has("WPA1") && has("WPA2") {
        AuthMethod::WpaWpa2Psk
    } else if has("WPA2") {
        AuthMethod::Wpa2Psk
    } else if has("WPA1") {
        AuthMethod::WpaPsk
    } else if has("WEP") {
        AuthMethod::Wep
    } else {
        AuthMethod::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terse_fields_honor_escapes() {
        assert_eq!(split_terse("home:72:WPA2"), vec!["home", "72", "WPA2"]);
        assert_eq!(split_terse(r"lab\:3:40:WPA2"), vec!["lab:3", "40", "WPA2"]);
        assert_eq!(split_terse(r"back\\slash:1:"), vec![r"back\slash", "1", ""]);
    }

    #[test]
    fn scan_line_parsing() {
        let result = parse_scan_line("home:70:WPA1 WPA2").unwrap();
        assert_eq!(result.identifier, "home");
        assert_eq!(result.rssi, -65);
        assert_eq!(result.auth, AuthMethod::WpaWpa2Psk);

        assert!(parse_scan_line(":55:WPA2").is_none());
        assert!(parse_scan_line("home:strong:WPA2").is_none());
        assert!(parse_scan_line("garbage").is_none());
    }

    #[test]
    fn signal_percent_maps_to_dbm() {
        assert_eq!(percent_to_dbm(100), -50);
        assert_eq!(percent_to_dbm(60), -70);
        assert_eq!(percent_to_dbm(0), -100);
        assert_eq!(percent_to_dbm(150), -50);
    }

    #[test]
    fn security_classification() {
        assert_eq!(parse_security(""), AuthMethod::Open);
        assert_eq!(parse_security("--"), AuthMethod::Open);
        assert_eq!(parse_security("WEP"), AuthMethod::Wep);
        assert_eq!(parse_security("WPA1"), AuthMethod::WpaPsk);
        assert_eq!(parse_security("WPA2"), AuthMethod::Wpa2Psk);
        assert_eq!(parse_security("WPA3"), AuthMethod::Wpa3Psk);
        assert_eq!(parse_security("WPA2 WPA3"), AuthMethod::Wpa2Wpa3Psk);
        assert_eq!(parse_security("WPA2 802.1X"), AuthMethod::Wpa2Enterprise);
    }

    #[cfg(unix)]
    #[test]
    fn large_output_does_not_stall_the_command() {
        let output = run_program(
            "sh",
            &["-c", "head -c 200000 /dev/zero | tr '\\0' x"],
            &[],
            None,
            Duration::from_secs(10),
            "scan",
        )
        .unwrap();
        assert_eq!(output.len(), 200_000);
    }

    #[cfg(unix)]
    #[test]
    fn secret_is_passed_on_stdin() {
        let output = run_program(
            "cat",
            &[],
            &[],
            Some("correct horse"),
            Duration::from_secs(5),
            "connect",
        )
        .unwrap();
        assert_eq!(output, "correct horse\n");
    }

    #[cfg(unix)]
    #[test]
    fn failures_carry_stderr_and_timeouts_kill() {
        let err = run_program(
            "sh",
            &["-c", "echo 'no network' >&2; exit 4"],
            &[],
            None,
            Duration::from_secs(5),
            "connect",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LinkError::CommandFailed { status: Some(4), ref stderr, .. } if stderr == "no network"
        ));

        let err = run_program(
            "sleep",
            &["5"],
            &[],
            None,
            Duration::from_millis(100),
            "scan",
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::Timeout { operation: "scan" }));
    }
}
