//! Command-line interface for meterwatch.
//!
//! This binary provides a CLI for monitoring the simulated meter and
//! adjusting its flow via the daemon's HTTP API.

use std::env;

use anyhow::{Context, Result, bail};

use meterwatch::api_client::{
    self,
    types::{AlarmState, FlowPatchRequest, ThresholdState},
};
use meterwatch::meter::FlowDirection;
use meterwatch::monitor::AlarmKind;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "status" => cmd_status().await?,
        "alarms" => cmd_alarms().await?,
        "active" => cmd_active().await?,
        "config" => cmd_config().await?,
        "enable" => cmd_set_enabled(args.get(2), true).await?,
        "disable" => cmd_set_enabled(args.get(2), false).await?,
        "thresholds" => cmd_thresholds().await?,
        "set-rate" => cmd_set_rate(args.get(2)).await?,
        "random" => cmd_random(args.get(2)).await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: meterwatch-cli <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                     Show meter reading and open alarms");
    eprintln!("  alarms                     Show alarm history");
    eprintln!("  active                     Show open alarms only");
    eprintln!("  config                     Show alarm configuration as JSON");
    eprintln!("  enable <kind>              Enable leak, noFlow, burst or backflow");
    eprintln!("  disable <kind>             Disable an alarm kind");
    eprintln!("  thresholds                 Show per-alarm condition progress");
    eprintln!("  set-rate <m3/s>            Run the meter at a constant rate");
    eprintln!("  random <forward|reverse>   Run the meter at a random rate");
    eprintln!();
    eprintln!("Environment:");
    eprintln!(
        "  METERWATCH_API_URL    API base URL (default: {})",
        api_client::DEFAULT_BASE_URL
    );
}

/// Build an API client, honoring METERWATCH_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var("METERWATCH_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

/// Format a meter value as the register would show it: 7 integer
/// digits and 4 decimals.
fn format_reading(value: f64) -> String {
    format!("{:012.4}", value)
}

fn print_alarm(alarm: &AlarmState) {
    let end = match alarm.end_time {
        Some(end) => end.to_string(),
        None => "open".to_owned(),
    };
    println!(
        "  {:<3} {:<9} value {:>10.4}  {} -> {}",
        alarm.id, alarm.kind, alarm.trigger_value, alarm.start_time, end
    );
}

fn print_threshold(threshold: &ThresholdState) {
    let state = match (threshold.enabled, threshold.is_met) {
        (false, _) => "disabled",
        (true, true) => "met",
        (true, false) => "idle",
    };
    let average = threshold
        .current_average
        .map_or_else(|| "-".to_owned(), |avg| format!("{avg:.6}"));
    println!(
        "  {:<9} {:<8} {:>5.0}/{:<4}s  rate {}",
        threshold.kind, state, threshold.duration_secs, threshold.window_secs, average
    );
}

/// Print a summary of the current meter state.
async fn cmd_status() -> Result<()> {
    let client = make_client();
    let state = client.get_meter().await?;

    println!("Reading: {} m3", format_reading(state.current_reading));
    println!("Rate:    {:.6} m3/s", state.instantaneous_rate);
    if let Some(last) = state.readings.first() {
        println!(
            "Last:    {} m3 at {}",
            format_reading(last.reading),
            last.timestamp
        );
    }

    if state.active_alarms.is_empty() {
        println!("Alarms:  (none)");
    } else {
        println!("Alarms:");
        for alarm in &state.active_alarms {
            print_alarm(alarm);
        }
    }

    Ok(())
}

async fn cmd_alarms() -> Result<()> {
    let alarms = make_client().get_alarms().await?;

    if alarms.is_empty() {
        println!("No alarms raised.");
    }
    for alarm in &alarms {
        print_alarm(alarm);
    }

    Ok(())
}

async fn cmd_active() -> Result<()> {
    let alarms = make_client().get_active_alarms().await?;

    if alarms.is_empty() {
        println!("No open alarms.");
    }
    for alarm in &alarms {
        print_alarm(alarm);
    }

    Ok(())
}

async fn cmd_config() -> Result<()> {
    let config = make_client().get_config().await?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

/// Toggle one alarm kind, leaving the rest of the configuration alone.
async fn cmd_set_enabled(arg: Option<&String>, enabled: bool) -> Result<()> {
    let Some(arg) = arg else {
        bail!("expected an alarm kind: leak, noFlow, burst or backflow");
    };
    let kind: AlarmKind = arg
        .parse()
        .with_context(|| format!("invalid alarm kind: {arg}"))?;

    let client = make_client();
    let mut config = client.get_config().await?;
    config.set_enabled(kind, enabled);
    let applied = client.put_config(&config).await?;

    println!("{kind}: enabled={}", applied.rule(kind).enabled);

    Ok(())
}

async fn cmd_thresholds() -> Result<()> {
    for threshold in &make_client().get_thresholds().await? {
        print_threshold(threshold);
    }

    Ok(())
}

async fn cmd_set_rate(arg: Option<&String>) -> Result<()> {
    let Some(arg) = arg else {
        bail!("set-rate needs a rate in m3/s");
    };
    let rate: f64 = arg
        .parse()
        .with_context(|| format!("invalid rate: {arg}"))?;

    let request = FlowPatchRequest {
        rate: Some(rate),
        ..Default::default()
    };
    let state = make_client().patch_flow(&request).await?;
    println!("Flow: {:?}", state.flow);

    Ok(())
}

async fn cmd_random(arg: Option<&String>) -> Result<()> {
    let direction = match arg {
        Some(arg) => arg
            .parse::<FlowDirection>()
            .with_context(|| format!("invalid direction: {arg}"))?,
        None => FlowDirection::Forward,
    };

    let request = FlowPatchRequest {
        random: Some(direction),
        ..Default::default()
    };
    let state = make_client().patch_flow(&request).await?;
    println!("Flow: {:?}", state.flow);

    Ok(())
}
