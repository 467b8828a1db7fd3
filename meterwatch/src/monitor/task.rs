//! The task that owns all monitoring state.
//!
//! The simulated meter, the reading history, the engine and the
//! current alarm configuration live here and nowhere else. The API
//! reaches them only through [`MonitorCommand`]s and reads them only
//! through the published [`MeterState`].

use std::time::Duration;

use anyhow::anyhow;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::AlarmConfig;
use super::engine::{MonitoringEngine, Snapshot};
use crate::api::commands::MonitorCommand;
use crate::api_client::types::{AlarmState, MeterState, ReadingState, ThresholdState};
use crate::meter::{MeterSimulator, ReadingLog};
use crate::tracing::prelude::*;

/// Alarm evaluation cadence.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Simulated meter integration step, roughly 30 per second.
pub const SIMULATION_STEP: Duration = Duration::from_millis(33);

pub const DEFAULT_READING_INTERVAL: Duration = Duration::from_secs(10);

pub struct MonitorTask {
    simulator: MeterSimulator,
    log: ReadingLog,
    engine: MonitoringEngine,
    alarm_config: AlarmConfig,
    reading_interval: Duration,
    /// Pairs a monotonic instant with wall time so `now` follows the
    /// runtime clock (and a paused test clock) rather than the host's.
    origin: Instant,
    origin_wall: OffsetDateTime,
    last_reading: Option<Instant>,
    last_step: Instant,
    instantaneous_rate: f64,
    state_tx: watch::Sender<MeterState>,
}

impl MonitorTask {
    pub fn new(
        simulator: MeterSimulator,
        alarm_config: AlarmConfig,
        reading_interval: Duration,
        state_tx: watch::Sender<MeterState>,
    ) -> Self {
        let origin = Instant::now();
        let log = ReadingLog::with_baseline(simulator.value());

        Self {
            simulator,
            log,
            engine: MonitoringEngine::new(),
            alarm_config,
            reading_interval,
            origin,
            origin_wall: OffsetDateTime::now_utc(),
            last_reading: None,
            last_step: origin,
            instantaneous_rate: 0.0,
            state_tx,
        }
    }

    pub async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<MonitorCommand>,
        cancellation: CancellationToken,
    ) {
        info!(
            reading_interval_s = self.reading_interval.as_secs(),
            "Monitor started"
        );

        self.record_reading();
        self.publish_current();

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut step = tokio::time::interval(SIMULATION_STEP);
        step.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }
                _ = step.tick() => {
                    self.step();
                }
                _ = tick.tick() => {
                    self.tick();
                }
                Some(command) = command_rx.recv() => {
                    self.handle_command(command);
                }
            }
        }

        info!("Monitor stopped");
    }

    fn wall_clock(&self, at: Instant) -> OffsetDateTime {
        self.origin_wall + at.duration_since(self.origin)
    }

    fn step(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_step);
        self.last_step = now;
        self.simulator.advance(elapsed);
    }

    fn record_reading(&mut self) {
        let now = Instant::now();
        let reading = self
            .log
            .append(self.simulator.value(), self.wall_clock(now));
        self.last_reading = Some(now);

        debug!(
            id = %reading.id(),
            value = reading.cumulative_value(),
            consumption = reading.consumption_since_last(),
            "Reading recorded"
        );
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let reading_due = self
            .last_reading
            .is_none_or(|last| now.duration_since(last) >= self.reading_interval);
        if reading_due {
            self.record_reading();
        }

        let outcome = self.engine.tick(
            self.wall_clock(now),
            self.simulator.value(),
            &self.log,
            &self.alarm_config,
        );
        self.instantaneous_rate = outcome.instantaneous_rate;
        self.publish(&outcome.snapshot);
    }

    fn handle_command(&mut self, command: MonitorCommand) {
        let (reply, result) = match command {
            MonitorCommand::SetFlow { mode, reply } => {
                info!(?mode, "Flow changed");
                self.simulator.set_mode(mode);
                (reply, Ok(()))
            }
            MonitorCommand::UpdateAlarmConfig { config, reply } => {
                let result = config.validate().map_err(anyhow::Error::from);
                if result.is_ok() {
                    info!(?config, "Alarm configuration updated");
                    self.alarm_config = config;
                } else {
                    warn!(?config, "Rejected alarm configuration");
                }
                (reply, result)
            }
            MonitorCommand::SetReadingInterval { interval, reply } => {
                let result = if interval.is_zero() {
                    Err(anyhow!("reading interval must be positive"))
                } else {
                    info!(interval_s = interval.as_secs(), "Reading interval changed");
                    self.reading_interval = interval;
                    Ok(())
                };
                (reply, result)
            }
        };

        // Publish before replying so the caller sees its own change.
        self.publish_current();

        if reply.send(result).is_err() {
            debug!("Command reply channel closed");
        }
    }

    fn publish_current(&self) {
        let snapshot = self.engine.snapshot();
        self.publish(&snapshot);
    }

    fn publish(&self, snapshot: &Snapshot) {
        let state = MeterState {
            current_reading: self.simulator.value(),
            instantaneous_rate: self.instantaneous_rate,
            flow: self.simulator.mode().into(),
            reading_interval_secs: self.reading_interval.as_secs(),
            readings: self.log.iter().map(ReadingState::from).collect(),
            active_alarms: snapshot.active_alarms.iter().map(AlarmState::from).collect(),
            alarms: snapshot.alarms.iter().map(AlarmState::from).collect(),
            thresholds: snapshot
                .thresholds
                .iter()
                .map(|(kind, status)| ThresholdState::new(kind, status, &self.alarm_config))
                .collect(),
            alarm_config: self.alarm_config,
        };

        self.state_tx.send_replace(state);
    }
}
