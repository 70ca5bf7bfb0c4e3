use std::convert::Infallible;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtkrelay_link::ConnectivityHandle;
use tracing::{debug, error, info, warn};

use crate::collab::error::{CollabError, Result};

/// Self-update mechanism.
pub trait FirmwareUpdater {
    /// Version currently running.
    fn current_version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    /// Newer version on offer, if any.
    fn check_for_update(&mut self) -> Result<Option<String>>;

    /// Install and restart. Only returns on failure.
    fn perform_update(&mut self) -> Result<Infallible>;
}

/// Cadence of the update check loop.
#[derive(Debug, Clone)]
pub struct UpdateSchedule {
    /// Delay after start before the first check.
    pub initial_delay: Duration,
    /// Time between checks.
    pub interval: Duration,
    /// Extra wait after a failed install.
    pub failure_backoff: Duration,
}

impl Default for UpdateSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(60 * 60),
            failure_backoff: Duration::from_secs(60),
        }
    }
}

/// True when `offered` is a strictly newer semantic version than `current`.
/// A leading `v` is accepted; anything unparseable is never newer.
pub fn is_newer(offered: &str, current: &str) -> bool {
    let parse = |raw: &str| semver::Version::parse(raw.strip_prefix('v').unwrap_or(raw));
    match (parse(offered), parse(current)) {
        (Ok(offered), Ok(current)) => offered > current,
        (Err(err), _) => {
            warn!(offered, error = %err, "ignoring unparseable offered version");
            false
        }
        (_, Err(err)) => {
            warn!(current, error = %err, "running version is not semver, skipping update");
            false
        }
    }
}

const PAUSE_SLICE: Duration = Duration::from_millis(250);

/// Run the update check loop on its own thread until `running` clears.
///
/// Checks only happen while the link is up.
pub fn spawn_update_loop<U>(
    updater: U,
    link: ConnectivityHandle,
    schedule: UpdateSchedule,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>>
where
    U: FirmwareUpdater + Send + 'static,
{
    thread::Builder::new()
        .name("rtkrelay-update".to_string())
        .spawn(move || run_update_loop(updater, &link, &schedule, &running))
}

fn run_update_loop<U: FirmwareUpdater>(
    mut updater: U,
    link: &ConnectivityHandle,
    schedule: &UpdateSchedule,
    running: &AtomicBool,
) {
    if !pause(running, schedule.initial_delay) {
        return;
    }
    info!(
        interval = ?schedule.interval,
        current = updater.current_version(),
        "update checks started"
    );

    loop {
        if link.is_connected() {
            match updater.check_for_update() {
                Ok(Some(version)) => {
                    info!(%version, "new firmware available, updating");
                    match updater.perform_update() {
                        Ok(never) => match never {},
                        Err(err) => {
                            error!(error = %err, "firmware update failed");
                            if !pause(running, schedule.failure_backoff) {
                                return;
                            }
                        }
                    }
                }
                Ok(None) => debug!("firmware up to date"),
                Err(err) => warn!(error = %err, "update check failed"),
            }
        }

        if !pause(running, schedule.interval) {
            return;
        }
    }
}

/// Sleep unless `running` clears first. Returns false if it did.
fn pause(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}

/// Updater driven by two external commands.
///
/// The check command prints the available version on stdout (empty when
/// none). The apply command replaces the running process.
#[derive(Debug, Clone)]
pub struct CommandUpdater {
    check: Vec<String>,
    apply: Vec<String>,
    timeout: Duration,
}

impl CommandUpdater {
    /// Build from whitespace-separated command lines.
    pub fn new(check: &str, apply: &str) -> Result<Self> {
        let check: Vec<String> = check.split_whitespace().map(str::to_string).collect();
        let apply: Vec<String> = apply.split_whitespace().map(str::to_string).collect();
        if check.is_empty() || apply.is_empty() {
            return Err(CollabError::Update(
                "check and apply commands must not be empty".to_string(),
            ));
        }
        Ok(Self {
            check,
            apply,
            timeout: Duration::from_secs(60),
        })
    }

    /// Bound on the check command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl FirmwareUpdater for CommandUpdater {
    fn check_for_update(&mut self) -> Result<Option<String>> {
        let mut child = Command::new(&self.check[0])
            .args(&self.check[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CollabError::Update("check command timed out".to_string()));
            }
            thread::sleep(Duration::from_millis(50));
        };
        if !status.success() {
            return Err(CollabError::Update(format!(
                "check command exited with {status}"
            )));
        }

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)?;
        }
        let offered = stdout.trim();
        if offered.is_empty() || !is_newer(offered, self.current_version()) {
            return Ok(None);
        }
        Ok(Some(offered.to_string()))
    }

    #[cfg(unix)]
    fn perform_update(&mut self) -> Result<Infallible> {
        use std::os::unix::process::CommandExt;

        let err = Command::new(&self.apply[0]).args(&self.apply[1..]).exec();
        Err(err.into())
    }

    #[cfg(not(unix))]
    fn perform_update(&mut self) -> Result<Infallible> {
        let status = Command::new(&self.apply[0])
            .args(&self.apply[1..])
            .status()?;
        if status.success() {
            std::process::exit(0);
        }
        Err(CollabError::Update(format!(
            "apply command exited with {status}"
        )))
    }
}
