use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::detector::AlarmKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{kind} threshold must be a finite, non-negative rate (got {value})")]
    InvalidThreshold { kind: AlarmKind, value: f64 },
}

/// Settings for an alarm that compares a windowed rate to a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ThresholdAlarmConfig {
    pub enabled: bool,

    /// Flow rate (m³/s) the windowed average is compared against.
    pub threshold: f64,

    /// Averaging window, and how long the condition must hold before
    /// an alarm opens.
    pub window_secs: u64,
}

/// Settings for the no-flow alarm, which has no threshold of its own.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct NoFlowAlarmConfig {
    pub enabled: bool,
    pub window_secs: u64,
}

/// Per-type alarm settings, read fresh on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct AlarmConfig {
    pub leak: ThresholdAlarmConfig,
    pub no_flow: NoFlowAlarmConfig,
    pub burst: ThresholdAlarmConfig,
    pub backflow: ThresholdAlarmConfig,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            leak: ThresholdAlarmConfig {
                enabled: true,
                threshold: 0.02,
                window_secs: 30,
            },
            no_flow: NoFlowAlarmConfig {
                enabled: true,
                window_secs: 30,
            },
            burst: ThresholdAlarmConfig {
                enabled: true,
                threshold: 0.1,
                window_secs: 15,
            },
            backflow: ThresholdAlarmConfig {
                enabled: true,
                threshold: 0.01,
                window_secs: 30,
            },
        }
    }
}

/// One alarm type's settings in the shape the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmRule {
    pub enabled: bool,
    pub threshold: Option<f64>,
    pub window: Duration,
}

impl From<ThresholdAlarmConfig> for AlarmRule {
    fn from(config: ThresholdAlarmConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: Some(config.threshold),
            window: Duration::from_secs(config.window_secs),
        }
    }
}

impl From<NoFlowAlarmConfig> for AlarmRule {
    fn from(config: NoFlowAlarmConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: None,
            window: Duration::from_secs(config.window_secs),
        }
    }
}

impl AlarmConfig {
    pub fn rule(&self, kind: AlarmKind) -> AlarmRule {
        match kind {
            AlarmKind::Leak => self.leak.into(),
            AlarmKind::NoFlow => self.no_flow.into(),
            AlarmKind::Burst => self.burst.into(),
            AlarmKind::Backflow => self.backflow.into(),
        }
    }

    pub fn set_enabled(&mut self, kind: AlarmKind, enabled: bool) {
        match kind {
            AlarmKind::Leak => self.leak.enabled = enabled,
            AlarmKind::NoFlow => self.no_flow.enabled = enabled,
            AlarmKind::Burst => self.burst.enabled = enabled,
            AlarmKind::Backflow => self.backflow.enabled = enabled,
        }
    }

    /// Check the values the engine assumes are sane.
    ///
    /// Windows are unsigned so only thresholds need checking.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            (AlarmKind::Leak, self.leak.threshold),
            (AlarmKind::Burst, self.burst.threshold),
            (AlarmKind::Backflow, self.backflow.threshold),
        ];

        for (kind, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { kind, value });
            }
        }

        Ok(())
    }
}
