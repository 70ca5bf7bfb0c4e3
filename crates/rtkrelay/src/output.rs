use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtkrelay::frame::{DecoderStats, PositionFix};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct DecodeOutput {
    pub schema_id: &'static str,
    pub source: String,
    pub bytes: u64,
    pub chunk_size: usize,
    pub fixes: Vec<PositionFix>,
    pub fixed: u64,
    pub float: u64,
    pub frames: u64,
    pub rejected_syncs: u64,
    pub desync_resets: u64,
    pub truncated_bytes: u64,
}

impl DecodeOutput {
    pub fn new(source: String, bytes: u64, chunk_size: usize, fixes: Vec<PositionFix>) -> Self {
        Self {
            schema_id: "https://schemas.3leaps.dev/rtkrelay/cli/v1/decode-result.schema.json",
            source,
            bytes,
            chunk_size,
            fixes,
            fixed: 0,
            float: 0,
            frames: 0,
            rejected_syncs: 0,
            desync_resets: 0,
            truncated_bytes: 0,
        }
    }

    pub fn with_stats(mut self, stats: DecoderStats, fixed: u64, float: u64) -> Self {
        self.fixed = fixed;
        self.float = float;
        self.frames = stats.frames;
        self.rejected_syncs = stats.rejected_syncs;
        self.desync_resets = stats.desync_resets;
        self.truncated_bytes = stats.truncated_bytes;
        self
    }
}

pub fn print_decode(out: &DecodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "TIME (UTC)",
                    "SOLUTION",
                    "LATITUDE",
                    "LONGITUDE",
                    "ALT (m)",
                    "H ACC (m)",
                    "SATS",
                ]);
            for fix in &out.fixes {
                table.add_row(vec![
                    fix.time.to_string(),
                    fix.solution_label(),
                    format!("{:.7}", fix.latitude),
                    format!("{:.7}", fix.longitude),
                    format!("{:.3}", fix.altitude_msl),
                    format!("{:.3}", fix.horizontal_accuracy),
                    fix.satellites.to_string(),
                ]);
            }
            println!("{table}");
            print_decode_summary(out);
        }
        OutputFormat::Pretty => {
            for fix in &out.fixes {
                println!(
                    "{} {} lat={:.7} lon={:.7} alt={:.3}m hacc={:.3}m vacc={:.3}m sats={}",
                    fix.time,
                    fix.solution_label(),
                    fix.latitude,
                    fix.longitude,
                    fix.altitude_msl,
                    fix.horizontal_accuracy,
                    fix.vertical_accuracy,
                    fix.satellites
                );
            }
            print_decode_summary(out);
        }
    }
}

fn print_decode_summary(out: &DecodeOutput) {
    println!(
        "{}: {} bytes, {} frames, {} fixes ({} fixed, {} float), {} rejected syncs, {} resets",
        out.source,
        out.bytes,
        out.frames,
        out.fixes.len(),
        out.fixed,
        out.float,
        out.rejected_syncs,
        out.desync_resets
    );
}

#[derive(Serialize)]
pub struct ProbeOutput {
    pub schema_id: &'static str,
    pub host: String,
    pub port: u16,
    pub mountpoint: String,
    pub authenticated: bool,
    pub accepted: bool,
    pub status_line: Option<String>,
    pub bytes_received: u64,
    pub elapsed_ms: f64,
    pub error: Option<String>,
}

pub fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Caster Probe:");
            println!("  Caster:           {}:{}", out.host, out.port);
            println!("  Mountpoint:       /{}", out.mountpoint);
            println!(
                "  Authenticated:    {}",
                if out.authenticated { "yes" } else { "no" }
            );
            println!(
                "  Status:           {}",
                out.status_line.as_deref().unwrap_or("no response")
            );
            println!(
                "  Accepted:         {}",
                if out.accepted { "yes" } else { "no" }
            );
            println!("  Bytes received:   {}", out.bytes_received);
            println!("  Elapsed:          {:.2}ms", out.elapsed_ms);
            if let Some(error) = &out.error {
                println!("  Error:            {error}");
            }
        }
    }
}

fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}
