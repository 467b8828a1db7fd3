//! Command types sent from API handlers to the monitor task.
//!
//! Each command carries a oneshot reply channel so the handler can
//! await the result and translate it into an HTTP response.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;

use crate::meter::FlowMode;
use crate::monitor::AlarmConfig;

pub enum MonitorCommand {
    /// Change how the simulated meter moves.
    SetFlow {
        mode: FlowMode,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Replace the alarm configuration. Takes effect on the next tick.
    UpdateAlarmConfig {
        config: AlarmConfig,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Change how often a reading is recorded into the history.
    SetReadingInterval {
        interval: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
}
