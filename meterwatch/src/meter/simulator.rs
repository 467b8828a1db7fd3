//! Synthetic cumulative meter.
//!
//! Stands in for a real meter register: the live value integrates a
//! flow rate over wall time, either a constant rate set by the operator
//! or a random one bounded by [`MAX_RANDOM_RATE`].

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Upper bound of the random flow rate (m³/s).
pub const MAX_RANDOM_RATE: f64 = 0.05;

/// Longest step integrated at once. Larger gaps (a stalled runtime, a
/// suspended host) are truncated instead of producing a jump.
const MAX_STEP: Duration = Duration::from_secs(1);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlowDirection {
    #[default]
    Forward,
    Reverse,
}

impl FlowDirection {
    fn sign(self) -> f64 {
        match self {
            FlowDirection::Forward => 1.0,
            FlowDirection::Reverse => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowMode {
    /// Fixed rate in m³/s. Negative values run the meter backwards.
    Constant { rate: f64 },

    /// Uniform random magnitude in `[0, MAX_RANDOM_RATE)` each step.
    Random { direction: FlowDirection },
}

impl Default for FlowMode {
    fn default() -> Self {
        FlowMode::Constant { rate: 0.0 }
    }
}

#[derive(Debug)]
pub struct MeterSimulator {
    value: f64,
    mode: FlowMode,
    rng: StdRng,
}

impl Default for MeterSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterSimulator {
    /// A meter at zero with no flow.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Like [`new`](Self::new) but with a reproducible random sequence.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            value: 0.0,
            mode: FlowMode::default(),
            rng,
        }
    }

    /// Current cumulative value in m³.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FlowMode) {
        self.mode = mode;
    }

    /// Switch to a constant rate.
    pub fn apply_rate(&mut self, rate: f64) {
        self.mode = FlowMode::Constant { rate };
    }

    /// Integrate flow over `elapsed` and return the new value.
    pub fn advance(&mut self, elapsed: Duration) -> f64 {
        let dt_s = elapsed.min(MAX_STEP).as_secs_f64();

        let rate = match self.mode {
            FlowMode::Constant { rate } => rate,
            FlowMode::Random { direction } => {
                self.rng.gen_range(0.0..MAX_RANDOM_RATE) * direction.sign()
            }
        };

        self.value += rate * dt_s;
        self.value
    }
}
