use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use rtkrelay::link::NetworkProfile;
use rtkrelay::ntrip::{ClientConfig, Credentials, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod probe;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the rover: relay corrections and track the receiver's solution.
    Run(RunArgs),
    /// Decode a raw receiver capture and print its position fixes.
    Decode(DecodeArgs),
    /// Connect to the caster once and report the handshake outcome.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CasterArgs {
    /// Caster host name or address.
    #[arg(long, env = "RTKRELAY_CASTER_HOST")]
    pub caster: String,
    /// Caster TCP port.
    #[arg(long, env = "RTKRELAY_CASTER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Mountpoint to request.
    #[arg(long, env = "RTKRELAY_MOUNTPOINT")]
    pub mountpoint: String,
    /// Caster account name.
    #[arg(long, env = "RTKRELAY_USER", requires = "password")]
    pub user: Option<String>,
    /// Caster account password.
    #[arg(long, env = "RTKRELAY_PASSWORD", hide_env_values = true, requires = "user")]
    pub password: Option<String>,
    /// Override the User-Agent header.
    #[arg(long, env = "RTKRELAY_USER_AGENT")]
    pub user_agent: Option<String>,
    /// Bound on resolution and connect (e.g. 10s, 500ms).
    #[arg(long, env = "RTKRELAY_CONNECT_TIMEOUT", default_value = "10s")]
    pub connect_timeout: String,
    /// Silence after which the session is dropped and reopened.
    #[arg(long, env = "RTKRELAY_STALE_TIMEOUT", default_value = "15s")]
    pub stale_timeout: String,
}

impl CasterArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let credentials = match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some(
                Credentials::new(user.as_str(), password.as_str()).ok_or_else(|| {
                    CliError::new(USAGE, "caster user and password must not be empty")
                })?,
            ),
            (None, None) => None,
            _ => {
                return Err(CliError::new(
                    USAGE,
                    "caster user and password must be given together",
                ))
            }
        };

        let connect_timeout = parse_duration(&self.connect_timeout)?;
        let mut config = ClientConfig {
            host: self.caster.clone(),
            port: self.port,
            mountpoint: self.mountpoint.trim_start_matches('/').to_string(),
            credentials,
            connect_timeout,
            io_timeout: connect_timeout,
            stale_timeout: parse_duration(&self.stale_timeout)?,
            ..ClientConfig::default()
        };
        if let Some(agent) = &self.user_agent {
            config.user_agent = agent.clone();
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub caster: CasterArgs,

    /// Bus device the receiver is attached to.
    #[arg(long, env = "RTKRELAY_I2C_DEVICE", default_value = "/dev/i2c-1")]
    pub i2c_device: PathBuf,
    /// Receiver bus address (decimal or 0x-prefixed hex).
    #[arg(long, env = "RTKRELAY_I2C_ADDRESS", default_value = "0x42", value_parser = parse_address)]
    pub i2c_address: u16,

    /// Known network as SSID=PASSPHRASE. Repeat for each network.
    #[arg(
        long = "network",
        value_name = "SSID=PASSPHRASE",
        env = "RTKRELAY_NETWORK",
        hide_env_values = true
    )]
    pub networks: Vec<NetworkProfile>,
    /// Weakest acceptable signal in dBm.
    #[arg(
        long,
        env = "RTKRELAY_RSSI_THRESHOLD",
        default_value_t = -80,
        allow_negative_numbers = true
    )]
    pub rssi_threshold: i16,
    /// Wireless interface to manage.
    #[arg(long, env = "RTKRELAY_WIFI_INTERFACE")]
    pub wifi_interface: Option<String>,
    /// Do not manage the wireless link; assume the host keeps it up.
    #[arg(long, env = "RTKRELAY_NO_RADIO")]
    pub no_radio: bool,
    /// How long to wait for the link before starting the loop anyway.
    #[arg(long, env = "RTKRELAY_LINK_WAIT", default_value = "30s")]
    pub link_wait: String,

    /// Minimum spacing of caster connect attempts.
    #[arg(long, env = "RTKRELAY_RECONNECT_INTERVAL", default_value = "5s")]
    pub reconnect_interval: String,
    /// Position report cadence.
    #[arg(long, env = "RTKRELAY_REPORT_INTERVAL", default_value = "1s")]
    pub report_interval: String,

    /// Dashboard URL receiving JSON position reports (http:// only).
    #[arg(long, env = "RTKRELAY_TELEMETRY_URL")]
    pub telemetry_url: Option<String>,
    /// Power-supply capacity file to read the battery level from.
    #[arg(long, env = "RTKRELAY_BATTERY_PATH", conflicts_with = "fuel_gauge")]
    pub battery_path: Option<PathBuf>,
    /// Read the battery level from a MAX17048 on the receiver's bus.
    #[arg(long, env = "RTKRELAY_FUEL_GAUGE")]
    pub fuel_gauge: bool,

    /// Command printing the available firmware version.
    #[arg(long, env = "RTKRELAY_UPDATE_CHECK", requires = "update_apply")]
    pub update_check: Option<String>,
    /// Command installing the new firmware and restarting.
    #[arg(long, env = "RTKRELAY_UPDATE_APPLY", requires = "update_check")]
    pub update_apply: Option<String>,
    /// Time between update checks.
    #[arg(long, env = "RTKRELAY_UPDATE_INTERVAL", default_value = "1h")]
    pub update_interval: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw receiver capture file.
    pub path: PathBuf,
    /// Bytes fed to the decoder per call.
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u16).range(1..))]
    pub chunk: u16,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub caster: CasterArgs,
    /// How long to keep reading corrections after the handshake.
    #[arg(long, default_value = "2s")]
    pub listen: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s`, `2m`, `1h` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, scale_ms) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1_000)
    } else if let Some(num) = input.strip_suffix('m') {
        (num, 60_000)
    } else if let Some(num) = input.strip_suffix('h') {
        (num, 3_600_000)
    } else {
        (input, 1_000)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    value
        .checked_mul(scale_ms)
        .map(Duration::from_millis)
        .ok_or_else(|| CliError::new(USAGE, format!("duration out of range: {input}")))
}

fn parse_address(input: &str) -> Result<u16, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(address) => Err(format!("{address:#x} is not a 7-bit address")),
        Err(err) => Err(format!("invalid address {input:?}: {err}")),
    }
}
