//! The field loop.
//!
//! [`Rover`] owns the receiver transport, the frame decoder and the caster
//! session. Each [`Rover::tick`] forwards pending corrections to the
//! receiver before polling it for a new solution.

mod stats;
mod status;
mod timer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rtkrelay_bus::{BusError, BusTransport, RegisterBus};
use rtkrelay_frame::{DecoderConfig, FrameDecoder, PositionFix};
use rtkrelay_link::ConnectivityHandle;
use rtkrelay_ntrip::{CorrectionClient, StreamConnector, TcpConnector};
use tracing::{debug, info, warn};

use crate::collab::{
    BatteryGauge, LogIndicator, NoBattery, NoTelemetry, StatusIndicator, TelemetryReport,
    TelemetryReporter,
};

pub use stats::Statistics;
pub use status::StatusClass;
pub use timer::Interval;

/// Loop cadences and buffer sizes.
#[derive(Debug, Clone)]
pub struct RoverConfig {
    /// Sleep between ticks.
    pub tick: Duration,
    /// Minimum spacing of caster connect attempts.
    pub reconnect_interval: Duration,
    /// Position report cadence.
    pub report_interval: Duration,
    /// Status indicator refresh cadence.
    pub status_interval: Duration,
    /// Largest correction chunk read per tick.
    pub correction_buffer: usize,
    /// Largest receiver read per tick.
    pub receiver_read: usize,
    pub decoder: DecoderConfig,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
            reconnect_interval: Duration::from_secs(5),
            report_interval: Duration::from_secs(1),
            status_interval: Duration::from_millis(50),
            correction_buffer: 1024,
            receiver_read: 256,
            decoder: DecoderConfig::default(),
        }
    }
}

/// Relays corrections to the receiver and tracks its solutions.
pub struct Rover<B, C: StreamConnector = TcpConnector> {
    bus: BusTransport<B>,
    decoder: FrameDecoder,
    client: CorrectionClient<C>,
    link: ConnectivityHandle,
    battery: Box<dyn BatteryGauge + Send>,
    indicator: Box<dyn StatusIndicator + Send>,
    telemetry: Box<dyn TelemetryReporter + Send>,
    stats: Statistics,
    latest_fix: Option<PositionFix>,
    fresh_fix: bool,
    reconnect: Interval,
    report: Interval,
    status: Interval,
    corrections: Vec<u8>,
    receiver: Vec<u8>,
    tick: Duration,
    bus_fault: bool,
}

impl<B: RegisterBus, C: StreamConnector> Rover<B, C> {
    pub fn new(
        bus: BusTransport<B>,
        client: CorrectionClient<C>,
        link: ConnectivityHandle,
        config: RoverConfig,
    ) -> Self {
        Self {
            bus,
            decoder: FrameDecoder::with_config(config.decoder),
            client,
            link,
            battery: Box::new(NoBattery),
            indicator: Box::new(LogIndicator::new()),
            telemetry: Box::new(NoTelemetry),
            stats: Statistics::default(),
            latest_fix: None,
            fresh_fix: false,
            reconnect: Interval::new(config.reconnect_interval),
            report: Interval::new(config.report_interval),
            status: Interval::new(config.status_interval),
            corrections: vec![0u8; config.correction_buffer],
            receiver: vec![0u8; config.receiver_read],
            tick: config.tick,
            bus_fault: false,
        }
    }

    pub fn with_battery(mut self, battery: impl BatteryGauge + Send + 'static) -> Self {
        self.battery = Box::new(battery);
        self
    }

    pub fn with_indicator(mut self, indicator: impl StatusIndicator + Send + 'static) -> Self {
        self.indicator = Box::new(indicator);
        self
    }

    pub fn with_telemetry(mut self, telemetry: impl TelemetryReporter + Send + 'static) -> Self {
        self.telemetry = Box::new(telemetry);
        self
    }

    /// Run ticks until `running` clears, then close the caster session.
    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            caster = %self.client.config().host,
            mountpoint = %self.client.config().mountpoint,
            "rover loop started"
        );
        while running.load(Ordering::Acquire) {
            self.tick(Instant::now());
            thread::sleep(self.tick);
        }
        self.client.disconnect();
        info!(
            received = self.stats.correction_bytes_received,
            forwarded = self.stats.correction_bytes_forwarded,
            fixes = self.stats.fixes_decoded,
            "rover loop stopped"
        );
    }

    /// One pass of the loop. Never fails; every fault is logged and retried
    /// on a later tick.
    pub fn tick(&mut self, now: Instant) {
        self.client.check_stale();
        let link_up = self.link.is_connected();
        let mut streaming = self.client.is_streaming();

        if !streaming && link_up && self.reconnect.ready(now) {
            streaming = self.client.connect().is_ok();
        }

        if streaming {
            streaming = self.relay_corrections();
        }

        self.poll_receiver();

        // Reports follow the receiver: a silent bus produces none.
        if self.fresh_fix && self.report.ready(now) {
            self.emit_report();
        }

        if self.status.ready(now) {
            let carrier = self.latest_fix.map(|fix| fix.carrier_solution);
            StatusClass::derive(link_up, streaming, self.client.is_stale(), carrier)
                .apply(self.indicator.as_mut());
        }
    }

    /// Returns false when the session ended.
    fn relay_corrections(&mut self) -> bool {
        let received = match self.client.receive(&mut self.corrections) {
            Ok(0) => return true,
            Ok(n) => n,
            Err(err) => {
                debug!(error = %err, "correction session ended");
                return false;
            }
        };
        self.stats.correction_bytes_received += received as u64;

        match self.bus.write(&self.corrections[..received]) {
            Ok(written) => {
                self.stats.correction_bytes_forwarded += written as u64;
                self.bus_recovered();
            }
            Err(err) => self.bus_failed("forward corrections", &err),
        }
        true
    }

    fn poll_receiver(&mut self) {
        let read = match self.bus.read(&mut self.receiver) {
            Ok(n) => {
                self.bus_recovered();
                n
            }
            Err(err) => {
                self.bus_failed("poll receiver", &err);
                0
            }
        };

        // An empty feed still drains fixes left in the accumulator.
        if let Some(fix) = self.decoder.feed(&self.receiver[..read]) {
            self.stats.record_fix(&fix);
            self.latest_fix = Some(fix);
            self.fresh_fix = true;
        }
    }

    fn emit_report(&mut self) {
        let Some(fix) = self.latest_fix else {
            return;
        };
        self.fresh_fix = false;
        info!(
            time = %fix.time,
            solution = %fix.solution_label(),
            latitude = fix.latitude,
            longitude = fix.longitude,
            altitude = fix.altitude_msl,
            h_acc = fix.horizontal_accuracy,
            v_acc = fix.vertical_accuracy,
            satellites = fix.satellites,
            corrections = self.stats.correction_bytes_received,
            fixed = self.stats.fixed_count,
            float = self.stats.float_count,
            "position"
        );
        let battery = self.battery.percentage();
        let report = TelemetryReport::new(&fix, &self.stats, battery);
        self.telemetry.send(&report);
    }

    fn bus_failed(&mut self, operation: &'static str, err: &BusError) {
        if self.bus_fault {
            debug!(operation, error = %err, "receiver bus still failing");
        } else {
            warn!(
                operation,
                error = %err,
                transient = err.is_transient(),
                "receiver bus error"
            );
            self.bus_fault = true;
        }
    }

    fn bus_recovered(&mut self) {
        if self.bus_fault {
            info!("receiver bus recovered");
            self.bus_fault = false;
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Most recent decoded solution.
    pub fn latest_fix(&self) -> Option<PositionFix> {
        self.latest_fix
    }

    pub fn client(&self) -> &CorrectionClient<C> {
        &self.client
    }

    pub fn bus(&self) -> &BusTransport<B> {
        &self.bus
    }
}
