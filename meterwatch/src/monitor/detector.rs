//! Threshold detectors and their "continuously met since" timers.
//!
//! One [`ThresholdDetector`] exists per [`AlarmKind`]. The kind decides
//! what "met" means and what value an alarm records; the detector
//! tracks how long the condition has held.
//!
//! # State Machine
//!
//! ```text
//!           met                       met
//!  Idle ──────────► Active(now) ───────────► Active(since)
//!   ▲                   │                    duration = now - since
//!   │    not met        │                         │
//!   └───────────────────┴─────────────────────────┘
//! ```
//!
//! - **Idle:** condition false; duration is zero and there is no
//!   start time.
//! - **Active:** condition true since `since`. Duration grows with
//!   `now`; the start time never moves while the condition holds.
//!
//! Whether a sustained condition becomes an alarm is the ledger's
//! decision, not the detector's.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::meter::WindowStats;

/// Instantaneous rates with a magnitude below this count as no flow.
pub const NO_FLOW_EPSILON: f64 = 1e-4;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    Display,
    EnumIter,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AlarmKind {
    /// Small but persistent positive flow.
    Leak,
    /// No flow at all.
    NoFlow,
    /// Very high positive flow.
    Burst,
    /// Sustained reverse flow.
    Backflow,
}

impl AlarmKind {
    pub fn all() -> impl Iterator<Item = AlarmKind> {
        AlarmKind::iter()
    }

    /// Whether this kind's condition holds for `sample`.
    ///
    /// Kinds that compare a windowed average need both a threshold and
    /// window statistics; without either the condition can't be met.
    pub fn is_condition_met(self, sample: &FlowSample, threshold: Option<f64>) -> bool {
        let windowed = sample.window.map(|w| w.average_rate).zip(threshold);

        match self {
            AlarmKind::Leak => windowed.is_some_and(|(average, threshold)| {
                average > 0.0 && average < threshold && sample.instantaneous_rate > 0.0
            }),
            AlarmKind::NoFlow => sample.instantaneous_rate.abs() < NO_FLOW_EPSILON,
            AlarmKind::Burst => {
                windowed.is_some_and(|(average, threshold)| average >= threshold && average > 0.0)
            }
            AlarmKind::Backflow => windowed
                .is_some_and(|(average, threshold)| average < 0.0 && average.abs() >= threshold),
        }
    }

    /// Value recorded on an alarm of this kind when it opens.
    pub fn trigger_value(self, sample: &FlowSample) -> f64 {
        match self {
            AlarmKind::Leak => sample.window.map_or(0.0, |w| w.total_consumption),
            AlarmKind::NoFlow => 0.0,
            AlarmKind::Burst => sample.window.map_or(0.0, |w| w.average_rate),
            AlarmKind::Backflow => sample.instantaneous_rate,
        }
    }

    /// Rate shown next to the status. No-flow watches the
    /// instantaneous rate; the others watch their window average.
    pub fn observed_rate(self, sample: &FlowSample) -> Option<f64> {
        match self {
            AlarmKind::NoFlow => Some(sample.instantaneous_rate),
            _ => sample.window.map(|w| w.average_rate),
        }
    }
}

/// The measurements one detector is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSample {
    pub instantaneous_rate: f64,

    /// Aggregates over this kind's own window, if available.
    pub window: Option<WindowStats>,
}

/// Per-kind condition state, as displayed.
///
/// `is_met()` is derived from `met_since`, so an idle status can never
/// carry a start time or a non-zero duration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThresholdStatus {
    met_since: Option<OffsetDateTime>,
    duration: Duration,
    current_average: Option<f64>,
}

impl ThresholdStatus {
    pub fn is_met(&self) -> bool {
        self.met_since.is_some()
    }

    pub fn met_since(&self) -> Option<OffsetDateTime> {
        self.met_since
    }

    /// How long the condition has held continuously.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn current_average(&self) -> Option<f64> {
        self.current_average
    }
}

/// Result of feeding one tick to a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Condition false, and was false.
    Idle,
    /// Condition just became true.
    Started,
    /// Condition still true.
    Held,
    /// Condition was true and just became false.
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdDetector {
    kind: AlarmKind,
    status: ThresholdStatus,
}

impl ThresholdDetector {
    pub fn new(kind: AlarmKind) -> Self {
        Self {
            kind,
            status: ThresholdStatus::default(),
        }
    }

    pub fn kind(&self) -> AlarmKind {
        self.kind
    }

    pub fn status(&self) -> &ThresholdStatus {
        &self.status
    }

    /// Evaluate this kind's condition at `now` and advance the timer.
    pub fn evaluate(
        &mut self,
        sample: &FlowSample,
        threshold: Option<f64>,
        now: OffsetDateTime,
    ) -> Transition {
        let met = self.kind.is_condition_met(sample, threshold);
        self.update(met, self.kind.observed_rate(sample), now)
    }

    /// Apply an already-evaluated condition.
    ///
    /// | Previous | met   | Result                                  |
    /// |----------|-------|-----------------------------------------|
    /// | Idle     | false | `Idle`                                  |
    /// | Idle     | true  | `Started`, since = now, duration = 0    |
    /// | Active   | true  | `Held`, duration = now - since          |
    /// | Active   | false | `Cleared`, back to idle                 |
    pub fn update(
        &mut self,
        met: bool,
        current_average: Option<f64>,
        now: OffsetDateTime,
    ) -> Transition {
        let (transition, met_since) = match (self.status.met_since, met) {
            (None, false) => (Transition::Idle, None),
            (None, true) => (Transition::Started, Some(now)),
            (Some(since), true) => (Transition::Held, Some(since)),
            (Some(_), false) => (Transition::Cleared, None),
        };

        // A clock that steps backwards leaves the duration at zero
        // rather than going negative.
        let duration = met_since
            .and_then(|since| Duration::try_from(now - since).ok())
            .unwrap_or_default();

        self.status = ThresholdStatus {
            met_since,
            duration,
            current_average,
        };

        transition
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use time::macros::datetime;

    use super::*;

    const T0: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);

    fn at(secs: i64) -> OffsetDateTime {
        T0 + time::Duration::seconds(secs)
    }

    fn sample(instantaneous_rate: f64, average_rate: Option<f64>) -> FlowSample {
        FlowSample {
            instantaneous_rate,
            window: average_rate.map(|average_rate| WindowStats {
                total_consumption: average_rate * 30.0,
                elapsed: Duration::from_secs(30),
                average_rate,
            }),
        }
    }

    #[test_case(0.001, Some(0.0005), true ; "small positive flow")]
    #[test_case(0.001, Some(0.02), false ; "average at threshold")]
    #[test_case(0.001, Some(0.0), false ; "zero average")]
    #[test_case(0.0, Some(0.0005), false ; "flow stopped right now")]
    #[test_case(0.001, None, false ; "no window data")]
    fn leak_condition(instantaneous: f64, average: Option<f64>, expected: bool) {
        let met = AlarmKind::Leak.is_condition_met(&sample(instantaneous, average), Some(0.02));

        assert_eq!(met, expected);
    }

    #[test_case(0.0, true ; "zero")]
    #[test_case(0.000_09, true ; "below epsilon")]
    #[test_case(-0.000_09, true ; "small reverse below epsilon")]
    #[test_case(0.0001, false ; "at epsilon")]
    #[test_case(-0.5, false ; "reverse flow")]
    fn no_flow_condition(instantaneous: f64, expected: bool) {
        let met = AlarmKind::NoFlow.is_condition_met(&sample(instantaneous, None), None);

        assert_eq!(met, expected);
    }

    #[test_case(Some(0.1), true ; "at threshold")]
    #[test_case(Some(0.2), true ; "above threshold")]
    #[test_case(Some(0.099), false ; "below threshold")]
    #[test_case(None, false ; "no window data")]
    fn burst_condition(average: Option<f64>, expected: bool) {
        let met = AlarmKind::Burst.is_condition_met(&sample(0.0, average), Some(0.1));

        assert_eq!(met, expected);
    }

    #[test]
    fn burst_needs_positive_flow_even_with_zero_threshold() {
        let met = AlarmKind::Burst.is_condition_met(&sample(0.0, Some(0.0)), Some(0.0));

        assert!(!met);
    }

    #[test_case(Some(-0.05), true ; "strong reverse flow")]
    #[test_case(Some(-0.01), true ; "at threshold")]
    #[test_case(Some(-0.005), false ; "weak reverse flow")]
    #[test_case(Some(0.05), false ; "forward flow")]
    #[test_case(None, false ; "no window data")]
    fn backflow_condition(average: Option<f64>, expected: bool) {
        let met = AlarmKind::Backflow.is_condition_met(&sample(0.0, average), Some(0.01));

        assert_eq!(met, expected);
    }

    #[test]
    fn threshold_kinds_cannot_be_met_without_threshold() {
        let s = sample(0.001, Some(0.0005));

        assert!(!AlarmKind::Leak.is_condition_met(&s, None));
        assert!(!AlarmKind::Burst.is_condition_met(&s, None));
        assert!(!AlarmKind::Backflow.is_condition_met(&s, None));
    }

    #[test]
    fn trigger_values_follow_kind() {
        let s = sample(-0.04, Some(0.2));

        assert_eq!(AlarmKind::Leak.trigger_value(&s), 0.2 * 30.0);
        assert_eq!(AlarmKind::NoFlow.trigger_value(&s), 0.0);
        assert_eq!(AlarmKind::Burst.trigger_value(&s), 0.2);
        assert_eq!(AlarmKind::Backflow.trigger_value(&s), -0.04);
    }

    #[test]
    fn names_match_configuration_keys() {
        assert_eq!(AlarmKind::NoFlow.to_string(), "noFlow");
        assert_eq!(
            serde_json::to_string(&AlarmKind::Backflow).unwrap(),
            "\"backflow\""
        );
        assert_eq!(AlarmKind::all().count(), 4);
    }

    #[test]
    fn should_start_timer_when_condition_becomes_met() {
        let mut detector = ThresholdDetector::new(AlarmKind::NoFlow);

        let transition = detector.update(true, Some(0.0), at(5));

        assert_eq!(transition, Transition::Started);
        assert_eq!(detector.status().met_since(), Some(at(5)));
        assert_eq!(detector.status().duration(), Duration::ZERO);
    }

    #[test]
    fn should_grow_duration_while_condition_holds() {
        let mut detector = ThresholdDetector::new(AlarmKind::NoFlow);
        detector.update(true, None, at(5));

        let transition = detector.update(true, None, at(17));

        assert_eq!(transition, Transition::Held);
        assert_eq!(detector.status().met_since(), Some(at(5)));
        assert_eq!(detector.status().duration(), Duration::from_secs(12));
    }

    #[test]
    fn should_reset_when_condition_clears() {
        let mut detector = ThresholdDetector::new(AlarmKind::NoFlow);
        detector.update(true, None, at(0));
        detector.update(true, None, at(10));

        let transition = detector.update(false, Some(0.3), at(11));

        assert_eq!(transition, Transition::Cleared);
        assert!(!detector.status().is_met());
        assert_eq!(detector.status().met_since(), None);
        assert_eq!(detector.status().duration(), Duration::ZERO);
        assert_eq!(detector.status().current_average(), Some(0.3));
    }

    #[test]
    fn should_restart_timer_after_interruption() {
        let mut detector = ThresholdDetector::new(AlarmKind::NoFlow);
        detector.update(true, None, at(0));
        detector.update(false, None, at(20));

        detector.update(true, None, at(21));
        detector.update(true, None, at(30));

        assert_eq!(detector.status().met_since(), Some(at(21)));
        assert_eq!(detector.status().duration(), Duration::from_secs(9));
    }

    #[test]
    fn should_keep_current_average_while_idle() {
        let mut detector = ThresholdDetector::new(AlarmKind::Burst);

        let transition = detector.evaluate(&sample(0.05, Some(0.05)), Some(0.1), at(0));

        assert_eq!(transition, Transition::Idle);
        assert_eq!(detector.status().current_average(), Some(0.05));
    }

    #[test]
    fn should_not_go_negative_when_clock_steps_back() {
        let mut detector = ThresholdDetector::new(AlarmKind::NoFlow);
        detector.update(true, None, at(10));

        detector.update(true, None, at(5));

        assert_eq!(detector.status().duration(), Duration::ZERO);
        assert_eq!(detector.status().met_since(), Some(at(10)));
    }
}
