use crate::cmd::RunArgs;
use crate::exit::CliResult;

#[cfg(target_os = "linux")]
pub fn run(args: RunArgs) -> CliResult<i32> {
    field::run(args)
}

#[cfg(not(target_os = "linux"))]
pub fn run(_args: RunArgs) -> CliResult<i32> {
    Err(crate::exit::CliError::new(
        crate::exit::TRANSPORT_ERROR,
        "the receiver bus requires Linux i2c-dev",
    ))
}

#[cfg(target_os = "linux")]
mod field {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::JoinHandle;

    use rtkrelay::bus::{BusConfig, BusTransport, I2cDevice};
    use rtkrelay::collab::telemetry::DEFAULT_TIMEOUT;
    use rtkrelay::collab::{
        parse_endpoint, spawn_update_loop, CommandUpdater, FuelGauge, HttpTelemetry, SysfsBattery,
        UpdateSchedule, FUEL_GAUGE_ADDRESS,
    };
    use rtkrelay::link::{ConnectivityHandle, ConnectivityManager, LinkConfig, NmcliRadio};
    use rtkrelay::ntrip::CorrectionClient;
    use rtkrelay::{Rover, RoverConfig};
    use tracing::{info, warn};

    use crate::cmd::{parse_duration, RunArgs};
    use crate::exit::{
        bus_error, collab_error, io_error, link_error, CliError, CliResult, INTERNAL, SUCCESS,
    };

    pub fn run(args: RunArgs) -> CliResult<i32> {
        let client_config = args.caster.client_config()?;
        let rover_config = RoverConfig {
            reconnect_interval: parse_duration(&args.reconnect_interval)?,
            report_interval: parse_duration(&args.report_interval)?,
            ..RoverConfig::default()
        };
        let link_wait = parse_duration(&args.link_wait)?;
        let endpoint = args
            .telemetry_url
            .as_deref()
            .map(parse_endpoint)
            .transpose()
            .map_err(|err| collab_error("telemetry url", err))?;
        let updater = match (&args.update_check, &args.update_apply) {
            (Some(check), Some(apply)) => Some(
                CommandUpdater::new(check, apply).map_err(|err| collab_error("updater", err))?,
            ),
            _ => None,
        };
        let schedule = UpdateSchedule {
            interval: parse_duration(&args.update_interval)?,
            ..UpdateSchedule::default()
        };

        let bus_config = BusConfig {
            device: args.i2c_device.clone(),
            address: args.i2c_address,
            ..BusConfig::default()
        };
        let bus =
            BusTransport::open(&bus_config).map_err(|err| bus_error("open receiver", err))?;
        let gauge = if args.fuel_gauge {
            let device = I2cDevice::open(&bus_config.device, FUEL_GAUGE_ADDRESS)
                .map_err(|err| bus_error("open fuel gauge", err))?;
            Some(FuelGauge::new(device))
        } else {
            None
        };

        let running = Arc::new(AtomicBool::new(true));
        install_ctrlc_handler(running.clone())?;

        let mut workers = Vec::new();
        let link = start_link(&args, &running, &mut workers)?;
        if !link.wait_connected(link_wait) {
            warn!(waited = ?link_wait, "network not up yet, starting anyway");
        }

        if let Some(updater) = updater {
            let worker = spawn_update_loop(updater, link.clone(), schedule, running.clone())
                .map_err(|err| io_error("start update loop", err))?;
            workers.push(worker);
        }

        let mut rover = Rover::new(bus, CorrectionClient::new(client_config), link, rover_config);
        if let Some(gauge) = gauge {
            rover = rover.with_battery(gauge);
        } else if let Some(path) = &args.battery_path {
            rover = rover.with_battery(SysfsBattery::new(path));
        }
        if let Some(endpoint) = endpoint {
            info!(%endpoint, "telemetry enabled");
            let telemetry = HttpTelemetry::spawn(endpoint, DEFAULT_TIMEOUT)
                .map_err(|err| collab_error("start telemetry", err))?;
            rover = rover.with_telemetry(telemetry);
        }

        rover.run(&running);
        drop(rover);

        running.store(false, Ordering::SeqCst);
        for worker in workers {
            let _ = worker.join();
        }
        Ok(SUCCESS)
    }

    fn start_link(
        args: &RunArgs,
        running: &Arc<AtomicBool>,
        workers: &mut Vec<JoinHandle<()>>,
    ) -> CliResult<ConnectivityHandle> {
        if args.no_radio || args.networks.is_empty() {
            info!("link managed by the host");
            return Ok(ConnectivityHandle::always_up("host"));
        }

        let mut radio = NmcliRadio::new();
        if let Some(interface) = &args.wifi_interface {
            radio = radio.with_interface(interface.as_str());
        }
        let config = LinkConfig {
            profiles: args.networks.clone(),
            rssi_threshold: args.rssi_threshold,
            ..LinkConfig::default()
        };
        let manager =
            ConnectivityManager::new(radio, config).map_err(|err| link_error("link setup", err))?;
        let handle = manager.handle();
        let worker = manager
            .spawn(running.clone())
            .map_err(|err| io_error("start link manager", err))?;
        workers.push(worker);
        Ok(handle)
    }

    fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
    }
}
