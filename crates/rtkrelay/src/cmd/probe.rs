use std::time::Instant;

use rtkrelay::ntrip::CorrectionClient;
use tracing::debug;

use crate::cmd::{parse_duration, ProbeArgs};
use crate::exit::{ntrip_error, CliResult, SUCCESS};
use crate::output::{print_probe, OutputFormat, ProbeOutput};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.caster.client_config()?;
    let listen = parse_duration(&args.listen)?;

    let mut out = ProbeOutput {
        schema_id: "https://schemas.3leaps.dev/rtkrelay/cli/v1/caster-probe.schema.json",
        host: config.host.clone(),
        port: config.port,
        mountpoint: config.mountpoint.clone(),
        authenticated: config.credentials.is_some(),
        accepted: false,
        status_line: None,
        bytes_received: 0,
        elapsed_ms: 0.0,
        error: None,
    };

    let start = Instant::now();
    let mut client = CorrectionClient::new(config);
    let connected = client.connect();
    out.status_line = client.last_status().map(str::to_string);

    if let Err(err) = connected {
        out.elapsed_ms = elapsed_ms(start);
        out.error = Some(err.to_string());
        print_probe(&out, format);
        return Err(ntrip_error("probe failed", err));
    }
    out.accepted = true;

    let mut buf = vec![0u8; 1024];
    let listen_start = Instant::now();
    while listen_start.elapsed() < listen {
        if let Err(err) = client.receive(&mut buf) {
            debug!(error = %err, "correction stream ended during probe");
            out.error = Some(err.to_string());
            break;
        }
    }
    client.disconnect();

    out.bytes_received = client.bytes_received();
    out.elapsed_ms = elapsed_ms(start);
    print_probe(&out, format);
    Ok(SUCCESS)
}

fn elapsed_ms(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}
