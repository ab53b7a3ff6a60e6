//! Fusion DAQ - synthetic acquisition runner
//!
//! Loads a run configuration, simulates the acquisition pipeline against
//! emulated converters and a host model, decodes the stream and prints a
//! summary.

use anyhow::{bail, Context, Result};
use fusion_daq::session::StopReason;
use fusion_daq::{run_session, AppConfig, SessionReport, SinkKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fusion_daq=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut sink: Option<SinkKind> = None;
    let mut frames: Option<u64> = None;
    let mut output: Option<PathBuf> = None;
    let mut print_config = false;
    let mut json = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("fusion-daq {} ({})", fusion_daq::VERSION, fusion_daq::BUILD_DATE);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--print-config" => print_config = true,
            "--json" => json = true,
            "--config" | "-c" | "--sink" | "-s" | "--frames" | "-n" | "--output" | "-o" => {
                let Some(value) = args.get(i + 1) else {
                    bail!("{} requires a value", args[i]);
                };
                match args[i].as_str() {
                    "--config" | "-c" => config_path = Some(PathBuf::from(value)),
                    "--output" | "-o" => output = Some(PathBuf::from(value)),
                    "--sink" | "-s" => match value.as_str() {
                        "usb" => sink = Some(SinkKind::Usb),
                        "nor" => sink = Some(SinkKind::Nor),
                        other => bail!("Unknown sink '{}' (expected usb or nor)", other),
                    },
                    _ => {
                        let n = value
                            .parse()
                            .with_context(|| format!("Invalid frame count: {}", value))?;
                        frames = Some(n);
                    }
                }
                i += 2;
                continue;
            }
            arg => {
                print_help();
                bail!("Unknown argument: {}", arg);
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(kind) = sink {
        config.pipeline.sink.kind = kind;
    }
    if let Some(n) = frames {
        config.frames = n;
    }
    if output.is_some() {
        config.capture = output;
    }
    config
        .pipeline
        .validate()
        .context("Invalid pipeline configuration")?;

    if print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    // Set up Ctrl+C handler
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || {
        s.store(true, Ordering::SeqCst);
    })
    .ok();

    info!(
        version = fusion_daq::VERSION,
        divisor = config.pipeline.sample_clock_divisor(),
        "Starting acquisition"
    );
    let report = run_session(&config, &stop)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_clean() {
        error!("Acquisition finished with errors");
        std::process::exit(1);
    }
    Ok(())
}

fn print_help() {
    println!("Usage: fusion-daq [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config FILE   Load run configuration from a JSON file");
    println!("  -s, --sink KIND     Sink adapter: usb or nor (overrides the config)");
    println!("  -n, --frames N      Frames to acquire (default: 1000)");
    println!("  -o, --output FILE   Capture the raw byte stream to FILE");
    println!("      --print-config  Print the effective configuration and exit");
    println!("      --json          Print the run report as JSON");
    println!("  -v, --version       Show version");
    println!("  -h, --help          Show this help");
    println!();
    println!("Examples:");
    println!("  fusion-daq -s nor -n 5000");
    println!("  fusion-daq -c run.json -o {}", fusion_daq::capture::default_file_name());
}

fn print_report(report: &SessionReport) {
    let status = match (&report.stop_reason, report.is_clean()) {
        (StopReason::FramesReached, true) => "OK",
        (StopReason::Interrupted, true) => "STOPPED",
        (StopReason::DeviceFault, _) => "FAULT",
        _ => "ERROR",
    };
    println!("Sink:          {:?}", report.sink);
    println!(
        "Cycles:        {} ({:.3} ms simulated)",
        report.cycles,
        report.simulated_seconds * 1e3
    );
    println!("Bytes:         {}", report.bytes_received);
    println!(
        "Frames:        {} decoded, {} lost, {} stale, {} resyncs",
        report.frames_decoded,
        report.decoder.lost_frames,
        report.decoder.stale_frames,
        report.decoder.resyncs
    );
    if let Some(mismatched) = report.mismatched_frames {
        println!("Waveform:      {} mismatched frames", mismatched);
    }
    let stats = &report.pipeline;
    println!(
        "Pipeline:      {} transactions, {} overruns, {} missed, {} deferred cycles",
        stats.total_transactions(),
        stats.total_overruns(),
        stats.encoder.missed_samples,
        stats.encoder.deferred_cycles
    );
    for (i, stage) in stats.stages.iter().enumerate() {
        println!(
            "  stage {}:     {}/{} high water, {} bursts",
            i, stage.high_water, stage.depth, stage.bursts
        );
    }
    println!(
        "Delivered:     {} words, {} underruns",
        stats.sink.words_delivered, stats.sink.underruns
    );
    for (device, fault) in stats.faults() {
        println!("Fault:         device {}: {}", device, fault);
    }
    if let Some(path) = &report.capture {
        println!("Capture:       {} ({} bytes)", path.display(), report.capture_bytes);
    }
    println!("Status:        {}", status);
}
