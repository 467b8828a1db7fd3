//! Per-tick orchestration of detectors and the alarm ledger.

use time::OffsetDateTime;

use super::config::AlarmConfig;
use super::detector::{AlarmKind, FlowSample, ThresholdDetector, ThresholdStatus, Transition};
use super::ledger::{Alarm, AlarmEvent, AlarmLedger};
use crate::meter::{self, ReadingLog};
use crate::tracing::prelude::*;

/// Threshold status of every alarm kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThresholdStatuses {
    pub leak: ThresholdStatus,
    pub no_flow: ThresholdStatus,
    pub burst: ThresholdStatus,
    pub backflow: ThresholdStatus,
}

impl ThresholdStatuses {
    pub fn get(&self, kind: AlarmKind) -> &ThresholdStatus {
        match kind {
            AlarmKind::Leak => &self.leak,
            AlarmKind::NoFlow => &self.no_flow,
            AlarmKind::Burst => &self.burst,
            AlarmKind::Backflow => &self.backflow,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlarmKind, &ThresholdStatus)> + '_ {
        AlarmKind::all().map(move |kind| (kind, self.get(kind)))
    }
}

/// Externally visible engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub active_alarms: Vec<Alarm>,
    /// Full history, oldest first.
    pub alarms: Vec<Alarm>,
    pub thresholds: ThresholdStatuses,
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Instantaneous rate the tick was evaluated with (m³/s).
    pub instantaneous_rate: f64,
    /// Alarms opened or closed by this tick.
    pub events: Vec<AlarmEvent>,
    pub snapshot: Snapshot,
}

/// Owns the four detectors and the alarm ledger.
///
/// The engine holds no clock: every tick is handed `now`, so the same
/// prior state and inputs always produce the same outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringEngine {
    leak: ThresholdDetector,
    no_flow: ThresholdDetector,
    burst: ThresholdDetector,
    backflow: ThresholdDetector,
    ledger: AlarmLedger,
}

impl Default for MonitoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringEngine {
    pub fn new() -> Self {
        Self {
            leak: ThresholdDetector::new(AlarmKind::Leak),
            no_flow: ThresholdDetector::new(AlarmKind::NoFlow),
            burst: ThresholdDetector::new(AlarmKind::Burst),
            backflow: ThresholdDetector::new(AlarmKind::Backflow),
            ledger: AlarmLedger::new(),
        }
    }

    fn detector_mut(&mut self, kind: AlarmKind) -> &mut ThresholdDetector {
        match kind {
            AlarmKind::Leak => &mut self.leak,
            AlarmKind::NoFlow => &mut self.no_flow,
            AlarmKind::Burst => &mut self.burst,
            AlarmKind::Backflow => &mut self.backflow,
        }
    }

    pub fn ledger(&self) -> &AlarmLedger {
        &self.ledger
    }

    /// Evaluate every enabled alarm kind at `now`.
    ///
    /// `live_value` is the meter's cumulative value at `now`, which may
    /// be ahead of the newest logged reading. Disabled kinds are skipped
    /// outright: their status keeps whatever the last enabled tick left
    /// and their alarms are neither opened nor closed.
    pub fn tick(
        &mut self,
        now: OffsetDateTime,
        live_value: f64,
        log: &ReadingLog,
        config: &AlarmConfig,
    ) -> TickOutcome {
        let instantaneous_rate = meter::estimate(log, live_value, now);
        let mut events = Vec::new();

        for kind in AlarmKind::all() {
            let rule = config.rule(kind);
            if !rule.enabled {
                continue;
            }

            let sample = FlowSample {
                instantaneous_rate,
                window: meter::window_stats(log, live_value, now, rule.window),
            };

            let detector = self.detector_mut(kind);
            match detector.evaluate(&sample, rule.threshold, now) {
                Transition::Started => debug!(%kind, "Alarm condition met"),
                Transition::Cleared => debug!(%kind, "Alarm condition cleared"),
                Transition::Idle | Transition::Held => {}
            }
            let status = *detector.status();

            let event = self.ledger.reconcile(
                kind,
                &status,
                rule.window,
                kind.trigger_value(&sample),
                now,
            );

            match event {
                Some(AlarmEvent::Opened(alarm)) => info!(
                    %kind,
                    id = %alarm.id(),
                    trigger_value = alarm.trigger_value(),
                    "Alarm opened"
                ),
                Some(AlarmEvent::Closed(alarm)) => info!(
                    %kind,
                    id = %alarm.id(),
                    "Alarm closed"
                ),
                None => {}
            }
            events.extend(event);
        }

        trace!(
            live_value,
            instantaneous_rate,
            active = self.ledger.active().count(),
            "Monitor tick"
        );

        TickOutcome {
            instantaneous_rate,
            events,
            snapshot: self.snapshot(),
        }
    }

    /// Current state without evaluating anything.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            active_alarms: self.ledger.active().copied().collect(),
            alarms: self.ledger.all().to_vec(),
            thresholds: ThresholdStatuses {
                leak: *self.leak.status(),
                no_flow: *self.no_flow.status(),
                burst: *self.burst.status(),
                backflow: *self.backflow.status(),
            },
        }
    }
}
