//! Drive the alarm engine over a recorded capture.

use meterwatch::meter::ReadingLog;
use meterwatch::monitor::{Alarm, AlarmConfig, AlarmEvent, MonitoringEngine};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::capture::{self, Capture};

/// Upper bound on engine ticks for a single replay.
pub const MAX_TICKS: usize = 10_000_000;

#[derive(Error, Debug, PartialEq)]
pub enum ReplayError {
    #[error("tick interval must be a positive number of seconds, got {0}")]
    InvalidTick(f64),

    #[error("{ticks} ticks needed, limit is {MAX_TICKS}; use a longer tick interval")]
    TooManyTicks { ticks: f64 },

    #[error("time {0}s is outside the representable range")]
    OutOfRange(f64),
}

/// Alarm event stamped with capture-relative time.
#[derive(Debug, Clone)]
pub struct ReplayEvent {
    pub time_s: f64,
    pub event: AlarmEvent,
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub events: Vec<ReplayEvent>,
    pub alarms: Vec<Alarm>,
    pub ticks: usize,
}

fn at(time_s: f64) -> Result<OffsetDateTime, ReplayError> {
    capture::timestamp(time_s).ok_or(ReplayError::OutOfRange(time_s))
}

/// Tick the engine every `tick_secs` from the first sample to the last.
///
/// Each sample is logged at its own timestamp once the tick clock
/// reaches it; the live value between samples is interpolated.
pub fn replay(
    capture: &Capture,
    config: &AlarmConfig,
    tick_secs: f64,
) -> Result<ReplayReport, ReplayError> {
    if !(tick_secs.is_finite() && tick_secs > 0.0) {
        return Err(ReplayError::InvalidTick(tick_secs));
    }

    let start = capture.first().time_s;
    let end = capture.end_time();
    let needed = ((end - start) / tick_secs).floor() + 1.0;
    if needed > MAX_TICKS as f64 {
        return Err(ReplayError::TooManyTicks { ticks: needed });
    }

    let mut log = ReadingLog::with_baseline(capture.first().reading);
    let mut engine = MonitoringEngine::new();
    let mut pending = capture.samples().iter().peekable();
    let mut events = Vec::new();
    let mut ticks = 0;

    loop {
        let time_s = start + ticks as f64 * tick_secs;
        if time_s > end + 1e-9 {
            break;
        }

        while let Some(sample) = pending.next_if(|s| s.time_s <= time_s) {
            trace!(time_s = sample.time_s, reading = sample.reading, "Logging sample");
            log.append(sample.reading, at(sample.time_s)?);
        }

        let now = at(time_s.min(end))?;
        let outcome = engine.tick(now, capture.value_at(time_s), &log, config);
        debug!(time_s, rate = outcome.instantaneous_rate, "Tick");
        events.extend(
            outcome
                .events
                .into_iter()
                .map(|event| ReplayEvent { time_s, event }),
        );
        ticks += 1;
    }

    Ok(ReplayReport {
        events,
        alarms: engine.ledger().all().to_vec(),
        ticks,
    })
}
