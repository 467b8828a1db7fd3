//! Meter simulation and alarm monitoring daemon.

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use meterwatch::api::{self, SharedState};
use meterwatch::api_client::types::MeterState;
use meterwatch::config::DaemonConfig;
use meterwatch::meter::MeterSimulator;
use meterwatch::monitor::MonitorTask;
use meterwatch::tracing::{self, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let config = DaemonConfig::from_env()?;
    info!(?config, "Starting meterwatch daemon");

    let running = CancellationToken::new();
    let tracker = TaskTracker::new();

    let (command_tx, command_rx) = mpsc::channel(16);
    let (state_tx, state_rx) = watch::channel(MeterState::default());

    let monitor = MonitorTask::new(
        MeterSimulator::new(),
        config.alarm_config,
        config.reading_interval,
        state_tx,
    );
    tracker.spawn(monitor.run(command_rx, running.clone()));

    {
        let running = running.clone();
        let api_addr = config.api_addr;
        let state = SharedState {
            state_rx,
            command_tx,
        };
        tracker.spawn(async move {
            if let Err(e) = api::serve(api_addr, state, running.clone()).await {
                error!("API server error: {e:#}");
                running.cancel();
            }
        });
    }
    tracker.close();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutdown requested");
        }
        _ = running.cancelled() => {}
    }

    running.cancel();
    tracker.wait().await;
    info!("Exiting.");

    Ok(())
}
