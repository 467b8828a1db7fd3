//! Replay a recorded meter capture through the alarm engine.
//!
//! Reads a `time_s,reading` CSV, ticks the same engine the daemon runs
//! across the recording, and prints each alarm as it opens and closes.

mod capture;
mod replay;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use meterwatch::config::load_alarm_config;
use meterwatch::monitor::{Alarm, AlarmConfig, AlarmEvent};
use tracing::info;

use crate::capture::{Capture, capture_time};
use crate::replay::{ReplayEvent, ReplayReport, replay};

#[derive(Parser, Debug)]
#[command(name = "meterwatch-replay")]
#[command(about = "Replay a meter capture through the alarm engine", long_about = None)]
struct Args {
    /// CSV capture with `time_s,reading` columns
    input: PathBuf,

    /// Alarm configuration JSON (defaults to built-in thresholds)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between engine ticks
    #[arg(short, long, default_value_t = 1.0)]
    tick_secs: f64,

    /// Log every tick
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = match &args.config {
        Some(path) => load_alarm_config(path)
            .with_context(|| format!("Failed to load alarm config {}", path.display()))?,
        None => AlarmConfig::default(),
    };

    let capture = Capture::from_path(&args.input)
        .with_context(|| format!("Failed to read capture {}", args.input.display()))?;
    info!(
        samples = capture.samples().len(),
        end_time = capture.end_time(),
        "Loaded capture"
    );

    let report = replay(&capture, &config, args.tick_secs).context("Replay failed")?;

    for event in &report.events {
        print_event(event);
    }
    print_summary(&report);

    Ok(())
}

fn print_event(event: &ReplayEvent) {
    let alarm = event.event.alarm();
    let label = match event.event {
        AlarmEvent::Opened(_) => "OPEN ".red().bold(),
        AlarmEvent::Closed(_) => "CLOSE".green().bold(),
    };
    println!(
        "[{:>10.3}s] {} {:<9} {} value {:.6}",
        event.time_s,
        label,
        alarm.kind().to_string().cyan(),
        alarm.id(),
        alarm.trigger_value()
    );
}

fn print_summary(report: &ReplayReport) {
    println!();
    println!(
        "{} ticks, {} alarms",
        report.ticks,
        report.alarms.len().to_string().bold()
    );
    if report.alarms.is_empty() {
        return;
    }

    println!(
        "{:<10} {:<9} {:>12} {:>12} {:>12}",
        "ID", "KIND", "START (s)", "END (s)", "VALUE"
    );
    for alarm in &report.alarms {
        print_alarm_row(alarm);
    }
}

fn print_alarm_row(alarm: &Alarm) {
    let end = match alarm.end_time() {
        Some(end) => format!("{:.3}", capture_time(end)),
        None => "active".yellow().to_string(),
    };
    println!(
        "{:<10} {:<9} {:>12.3} {:>12} {:>12.6}",
        alarm.id().to_string(),
        alarm.kind().to_string(),
        capture_time(alarm.start_time()),
        end,
        alarm.trigger_value()
    );
}
