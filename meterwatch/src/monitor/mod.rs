mod config;
mod detector;
mod engine;
mod ledger;
mod task;

pub use config::{AlarmConfig, AlarmRule, ConfigError, NoFlowAlarmConfig, ThresholdAlarmConfig};
pub use detector::{
    AlarmKind, FlowSample, NO_FLOW_EPSILON, ThresholdDetector, ThresholdStatus, Transition,
};
pub use engine::{MonitoringEngine, Snapshot, ThresholdStatuses, TickOutcome};
pub use ledger::{Alarm, AlarmEvent, AlarmId, AlarmLedger};
pub use task::{DEFAULT_READING_INTERVAL, MonitorTask, SIMULATION_STEP, TICK_INTERVAL};
