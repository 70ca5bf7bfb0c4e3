use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};
use crate::profile::{select, NetworkProfile, ScanResult};
use crate::radio::Radio;
use crate::state::{transition, Action, ConnectivityState, LinkEvent, RetryPolicy};

/// Configuration for the connectivity manager.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Networks the rover may join.
    pub profiles: Vec<NetworkProfile>,
    /// Weakest acceptable signal in dBm.
    pub rssi_threshold: i16,
    /// Reconnect attempts on the same network before rescanning.
    pub max_retries: u32,
    /// Pause before rescanning after retries run out.
    pub cooldown: Duration,
    /// Re-evaluation interval when no radio event arrives.
    pub scan_interval: Duration,
    /// Delay before the first scan.
    pub startup_delay: Duration,
    /// Longest single wait on the radio; bounds shutdown latency.
    pub poll_slice: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            rssi_threshold: -80,
            max_retries: 5,
            cooldown: Duration::from_secs(2),
            scan_interval: Duration::from_secs(30),
            startup_delay: Duration::from_secs(1),
            poll_slice: Duration::from_millis(250),
        }
    }
}

struct Shared {
    connected: AtomicBool,
    state: AtomicU8,
    identifier: RwLock<String>,
}

/// Read-only view of the link, shared with other threads.
///
/// Only the owning [`ConnectivityManager`] writes to it.
#[derive(Clone)]
pub struct ConnectivityHandle {
    shared: Arc<Shared>,
}

impl ConnectivityHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                state: AtomicU8::new(ConnectivityState::Disconnected as u8),
                identifier: RwLock::new(String::new()),
            }),
        }
    }

    /// A handle that always reports connected, for hosts whose network is
    /// managed outside this process.
    pub fn always_up(identifier: impl Into<String>) -> Self {
        let handle = Self::new();
        handle.publish(ConnectivityState::Connected, Some(&identifier.into()));
        handle
    }

    /// True while associated with a network.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Name of the joined network; empty when disconnected.
    pub fn current_identifier(&self) -> String {
        self.shared
            .identifier
            .read()
            .map(|id| id.clone())
            .unwrap_or_default()
    }

    /// Current link state.
    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Block until connected or `timeout` passes. Returns the final status.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_connected() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }

    fn publish(&self, state: ConnectivityState, identifier: Option<&str>) {
        if let Ok(mut current) = self.shared.identifier.write() {
            current.clear();
            if let Some(id) = identifier {
                current.push_str(id);
            }
        }
        self.shared.state.store(state as u8, Ordering::Release);
        self.shared
            .connected
            .store(state == ConnectivityState::Connected, Ordering::Release);
    }
}

impl std::fmt::Debug for ConnectivityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityHandle")
            .field("state", &self.state())
            .field("identifier", &self.current_identifier())
            .finish()
    }
}

/// Owns the radio and drives the link state machine.
pub struct ConnectivityManager<R> {
    radio: R,
    config: LinkConfig,
    policy: RetryPolicy,
    handle: ConnectivityHandle,
    state: ConnectivityState,
    retries: u32,
    current: Option<NetworkProfile>,
    queued: VecDeque<LinkEvent>,
}

impl<R: Radio> ConnectivityManager<R> {
    /// Create a manager over `radio`.
    pub fn new(radio: R, config: LinkConfig) -> Result<Self> {
        if config.profiles.is_empty() {
            return Err(LinkError::InvalidProfile(
                "at least one network profile is required".to_string(),
            ));
        }
        if config.poll_slice.is_zero() {
            return Err(LinkError::Radio("poll_slice must be non-zero".to_string()));
        }

        let policy = RetryPolicy {
            max_retries: config.max_retries,
        };
        Ok(Self {
            radio,
            config,
            policy,
            handle: ConnectivityHandle::new(),
            state: ConnectivityState::Disconnected,
            retries: 0,
            current: None,
            queued: VecDeque::new(),
        })
    }

    /// Handle for observers on other threads.
    pub fn handle(&self) -> ConnectivityHandle {
        self.handle.clone()
    }

    /// Current link state.
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Reconnect attempts made on the current network.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Borrow the radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Run the management loop on a dedicated thread until `running` clears.
    pub fn spawn(self, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>>
    where
        R: Send + 'static,
    {
        thread::Builder::new()
            .name("rtkrelay-link".to_string())
            .spawn(move || self.run(&running))
    }

    /// Run the management loop on the calling thread until `running` clears.
    pub fn run(mut self, running: &AtomicBool) {
        info!(
            networks = self.config.profiles.len(),
            rssi_threshold = self.config.rssi_threshold,
            "link manager starting"
        );
        for profile in &self.config.profiles {
            debug!(identifier = profile.identifier(), "configured network");
        }

        if !sleep_while_running(running, self.config.startup_delay, self.config.poll_slice) {
            return;
        }
        if let Err(err) = self.radio.start() {
            warn!(error = %err, "radio start failed, scanning anyway");
        }
        self.handle_event(LinkEvent::Started, running);

        let mut last_event = Instant::now();
        while running.load(Ordering::Acquire) {
            self.drain_queued(running);

            match self.radio.poll_event(self.config.poll_slice) {
                Some(event) => {
                    last_event = Instant::now();
                    self.handle_event(event.into(), running);
                }
                None if last_event.elapsed() >= self.config.scan_interval => {
                    last_event = Instant::now();
                    self.handle_event(LinkEvent::Tick, running);
                }
                None => {}
            }
        }

        self.handle.publish(ConnectivityState::Disconnected, None);
        info!("link manager stopped");
    }

    /// Apply one event and perform the resulting action.
    pub fn handle_event(&mut self, event: LinkEvent, running: &AtomicBool) {
        let next = transition(self.state, self.retries, &self.policy, &event);
        debug!(
            from = %self.state,
            to = %next.state,
            action = ?next.action,
            "link transition"
        );
        self.state = next.state;
        self.retries = next.retries;

        match &event {
            LinkEvent::Connected { identifier } => {
                info!(identifier = %identifier, "link up");
                self.handle.publish(next.state, Some(identifier));
            }
            LinkEvent::Disconnected { reason } => {
                warn!(reason = %reason, "link lost");
                self.handle.publish(next.state, None);
            }
            _ if next.state != ConnectivityState::Connected => {
                self.handle.publish(next.state, None);
            }
            _ => {}
        }

        match next.action {
            Action::None => {}
            Action::Scan => self.scan_and_connect(running),
            Action::Retry => {
                info!(
                    attempt = self.retries,
                    max = self.policy.max_retries,
                    "retrying network"
                );
                self.attempt(running);
            }
            Action::CooldownThenScan => {
                warn!("retries exhausted, rescanning for other networks");
                if sleep_while_running(running, self.config.cooldown, self.config.poll_slice) {
                    self.scan_and_connect(running);
                }
            }
        }
    }

    /// Process events the manager raised for itself.
    pub fn drain_queued(&mut self, running: &AtomicBool) {
        while let Some(event) = self.queued.pop_front() {
            if !running.load(Ordering::Acquire) {
                self.queued.clear();
                return;
            }
            self.handle_event(event, running);
        }
    }

    fn scan_and_connect(&mut self, running: &AtomicBool) {
        self.current = None;

        let results = match self.radio.scan() {
            Ok(results) => results,
            Err(err) => {
                warn!(error = %err, "scan failed");
                self.queued.push_back(LinkEvent::NoCandidate);
                return;
            }
        };
        self.log_scan(&results);

        let secure: Vec<ScanResult> = results
            .into_iter()
            .filter(|result| result.auth.meets_wpa2())
            .collect();

        let Some(profile) = select(&secure, &self.config.profiles, self.config.rssi_threshold)
        else {
            warn!("no known network with sufficient signal");
            self.queued.push_back(LinkEvent::NoCandidate);
            return;
        };

        let profile = profile.clone();
        info!(identifier = profile.identifier(), "selected network");
        let identifier = profile.identifier().to_string();
        self.current = Some(profile);
        self.handle_event(LinkEvent::Selected { identifier }, running);
        self.attempt(running);
    }

    fn attempt(&mut self, running: &AtomicBool) {
        let Some(profile) = self.current.clone() else {
            // Retry with nothing selected; go find something.
            self.scan_and_connect(running);
            return;
        };

        info!(identifier = profile.identifier(), "connecting");
        if let Err(err) = self.radio.connect(&profile) {
            self.queued.push_back(LinkEvent::Disconnected {
                reason: err.to_string(),
            });
        }
    }

    fn log_scan(&self, results: &[ScanResult]) {
        debug!(count = results.len(), "scan complete");
        for result in results {
            let known = self
                .config
                .profiles
                .iter()
                .any(|p| p.identifier() == result.identifier);
            debug!(
                identifier = %result.identifier,
                rssi = result.rssi,
                auth = ?result.auth,
                known,
                weak = result.rssi < self.config.rssi_threshold,
                "access point"
            );
        }
    }
}

/// Sleep in slices so a cleared `running` flag is noticed promptly.
/// Returns false if interrupted.
fn sleep_while_running(running: &AtomicBool, duration: Duration, slice: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(slice));
    }
}
