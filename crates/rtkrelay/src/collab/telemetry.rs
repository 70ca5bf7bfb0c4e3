use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtkrelay_frame::PositionFix;
use serde::Serialize;
use tracing::{debug, warn};

use crate::collab::error::{CollabError, Result};
use crate::rover::Statistics;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Position report pushed to a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub h_acc: f64,
    pub v_acc: f64,
    pub fix_type: u8,
    pub carr_soln: u8,
    pub num_sv: u8,
    pub rtcm_bytes: u64,
    pub fixed_count: u64,
    pub float_count: u64,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub battery_pct: i32,
    pub firmware_version: String,
}

impl TelemetryReport {
    pub fn new(fix: &PositionFix, stats: &Statistics, battery_pct: i32) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude_msl,
            h_acc: fix.horizontal_accuracy,
            v_acc: fix.vertical_accuracy,
            fix_type: fix.fix_quality.code(),
            carr_soln: fix.carrier_solution.code(),
            num_sv: fix.satellites,
            rtcm_bytes: stats.correction_bytes_received,
            fixed_count: stats.fixed_count,
            float_count: stats.float_count,
            hour: fix.time.hour,
            min: fix.time.minute,
            sec: fix.time.second,
            battery_pct,
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Best-effort telemetry sink. Must not block the caller.
pub trait TelemetryReporter {
    fn send(&mut self, report: &TelemetryReport);
}

/// Telemetry disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl TelemetryReporter for NoTelemetry {
    fn send(&mut self, _report: &TelemetryReport) {}
}

/// Validate a telemetry URL. Only `http` and `https` are accepted.
pub fn parse_endpoint(url: &str) -> Result<reqwest::Url> {
    let invalid = |reason| CollabError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid("not a valid URL"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(invalid("only http and https endpoints are supported")),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}

/// Blocking HTTP client bounded by `timeout` per request.
pub fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rtkrelay/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// POST one report as JSON and return the response status.
pub fn post_report(
    client: &reqwest::blocking::Client,
    endpoint: &reqwest::Url,
    report: &TelemetryReport,
) -> Result<u16> {
    let response = client.post(endpoint.clone()).json(report).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(CollabError::HttpStatus(status.as_u16()));
    }
    Ok(status.as_u16())
}

/// Posts reports from a worker thread.
///
/// At most one report waits in the queue; reports offered while the
/// worker is busy are dropped.
pub struct HttpTelemetry {
    tx: Option<SyncSender<TelemetryReport>>,
    worker: Option<JoinHandle<()>>,
    dropped: u64,
}

impl HttpTelemetry {
    pub fn spawn(endpoint: reqwest::Url, timeout: Duration) -> Result<Self> {
        let client = build_client(timeout)?;
        let (tx, rx) = mpsc::sync_channel::<TelemetryReport>(1);
        let worker = thread::Builder::new()
            .name("rtkrelay-telemetry".to_string())
            .spawn(move || {
                for report in rx {
                    match post_report(&client, &endpoint, &report) {
                        Ok(status) => debug!(status, "telemetry delivered"),
                        Err(err) => warn!(endpoint = %endpoint, error = %err, "telemetry failed"),
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            dropped: 0,
        })
    }

    /// Reports dropped because the worker was busy.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TelemetryReporter for HttpTelemetry {
    fn send(&mut self, report: &TelemetryReport) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(report.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                debug!(dropped = self.dropped, "telemetry worker busy, report dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("telemetry worker exited");
                self.tx = None;
            }
        }
    }
}

impl Drop for HttpTelemetry {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
