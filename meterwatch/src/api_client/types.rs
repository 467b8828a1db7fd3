//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::meter::{FlowDirection, FlowMode, Reading};
use crate::monitor::{Alarm, AlarmConfig, AlarmKind, ThresholdStatus};

/// Full meter state snapshot.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct MeterState {
    /// Live cumulative value in m³.
    pub current_reading: f64,
    /// Instantaneous flow rate in m³/s as of the last tick.
    pub instantaneous_rate: f64,
    pub flow: FlowState,
    pub reading_interval_secs: u64,
    /// Recorded readings, newest first.
    pub readings: Vec<ReadingState>,
    pub active_alarms: Vec<AlarmState>,
    /// Every alarm raised since startup, oldest first.
    pub alarms: Vec<AlarmState>,
    pub thresholds: Vec<ThresholdState>,
    pub alarm_config: AlarmConfig,
}

/// How the simulated meter is currently moving.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FlowState {
    Constant { rate: f64 },
    Random { direction: FlowDirection },
}

impl Default for FlowState {
    fn default() -> Self {
        FlowMode::default().into()
    }
}

impl From<FlowMode> for FlowState {
    fn from(mode: FlowMode) -> Self {
        match mode {
            FlowMode::Constant { rate } => FlowState::Constant { rate },
            FlowMode::Random { direction } => FlowState::Random { direction },
        }
    }
}

/// A recorded meter reading.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ReadingState {
    pub id: u64,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: OffsetDateTime,
    /// Cumulative value in m³.
    pub reading: f64,
    /// Change since the previous reading in m³.
    pub consumption: f64,
}

impl From<&Reading> for ReadingState {
    fn from(reading: &Reading) -> Self {
        Self {
            id: reading.id().get(),
            timestamp: reading.timestamp(),
            reading: reading.cumulative_value(),
            consumption: reading.consumption_since_last(),
        }
    }
}

/// An alarm, open or closed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct AlarmState {
    pub id: u64,
    pub kind: AlarmKind,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub end_time: Option<OffsetDateTime>,
    pub trigger_value: f64,
    pub active: bool,
}

impl From<&Alarm> for AlarmState {
    fn from(alarm: &Alarm) -> Self {
        Self {
            id: alarm.id().get(),
            kind: alarm.kind(),
            start_time: alarm.start_time(),
            end_time: alarm.end_time(),
            trigger_value: alarm.trigger_value(),
            active: alarm.is_active(),
        }
    }
}

/// Progress of one alarm kind's condition towards its window.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ThresholdState {
    pub kind: AlarmKind,
    pub enabled: bool,
    pub is_met: bool,
    #[serde(with = "time::serde::rfc3339::option", default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub met_since: Option<OffsetDateTime>,
    /// Seconds the condition has held continuously.
    pub duration_secs: f64,
    pub window_secs: u64,
    /// Rate the condition is judged on, in m³/s.
    pub current_average: Option<f64>,
}

impl ThresholdState {
    pub fn new(kind: AlarmKind, status: &ThresholdStatus, config: &AlarmConfig) -> Self {
        let rule = config.rule(kind);
        Self {
            kind,
            enabled: rule.enabled,
            is_met: status.is_met(),
            met_since: status.met_since(),
            duration_secs: status.duration().as_secs_f64(),
            window_secs: rule.window.as_secs(),
            current_average: status.current_average(),
        }
    }
}

/// Partial update of the simulated flow.
///
/// `rate` and `random` are mutually exclusive.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct FlowPatchRequest {
    /// Switch to a constant rate in m³/s.
    pub rate: Option<f64>,
    /// Switch to random flow in the given direction.
    pub random: Option<FlowDirection>,
    pub reading_interval_secs: Option<u64>,
}
