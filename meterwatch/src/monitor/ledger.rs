//! Authoritative alarm history.
//!
//! Alarms are appended when they open and closed in place; nothing is
//! ever removed. At most one alarm per [`AlarmKind`] is open at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;

use super::detector::{AlarmKind, ThresholdStatus};

/// Identifier assigned to each alarm in the order it opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmId(u64);

impl AlarmId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alarm-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alarm {
    id: AlarmId,
    kind: AlarmKind,
    start_time: OffsetDateTime,
    end_time: Option<OffsetDateTime>,
    trigger_value: f64,
}

impl Alarm {
    pub fn id(&self) -> AlarmId {
        self.id
    }

    pub fn kind(&self) -> AlarmKind {
        self.kind
    }

    /// When the underlying condition started holding, which precedes
    /// the moment the alarm was raised by the kind's window.
    pub fn start_time(&self) -> OffsetDateTime {
        self.start_time
    }

    pub fn end_time(&self) -> Option<OffsetDateTime> {
        self.end_time
    }

    pub fn trigger_value(&self) -> f64 {
        self.trigger_value
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A change the ledger made to one alarm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlarmEvent {
    Opened(Alarm),
    Closed(Alarm),
}

impl AlarmEvent {
    pub fn alarm(&self) -> &Alarm {
        match self {
            AlarmEvent::Opened(alarm) | AlarmEvent::Closed(alarm) => alarm,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmLedger {
    alarms: Vec<Alarm>,
    /// Index into `alarms` of the open alarm per kind.
    active: BTreeMap<AlarmKind, usize>,
    next_id: u64,
}

impl AlarmLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or close `kind`'s alarm to match `status`.
    ///
    /// - Opens when the condition is met, has held for at least
    ///   `window`, and no alarm of this kind is open. The alarm starts
    ///   at the status' `met_since`.
    /// - Closes the open alarm as soon as the condition is no longer
    ///   met, however long it had held.
    /// - Otherwise does nothing, including while a met condition is
    ///   still short of its window.
    pub fn reconcile(
        &mut self,
        kind: AlarmKind,
        status: &ThresholdStatus,
        window: Duration,
        trigger_value: f64,
        now: OffsetDateTime,
    ) -> Option<AlarmEvent> {
        match (status.met_since(), self.active.get(&kind).copied()) {
            (Some(since), None) if status.duration() >= window => {
                let alarm = Alarm {
                    id: AlarmId(self.next_id),
                    kind,
                    start_time: since,
                    end_time: None,
                    trigger_value,
                };
                self.next_id += 1;
                self.active.insert(kind, self.alarms.len());
                self.alarms.push(alarm);
                Some(AlarmEvent::Opened(alarm))
            }
            (None, Some(index)) => {
                self.active.remove(&kind);
                let alarm = &mut self.alarms[index];
                alarm.end_time = Some(now);
                Some(AlarmEvent::Closed(*alarm))
            }
            _ => None,
        }
    }

    /// The open alarm of `kind`, if any.
    pub fn active_for(&self, kind: AlarmKind) -> Option<&Alarm> {
        self.active.get(&kind).map(|&index| &self.alarms[index])
    }

    /// Open alarms, in the order they opened.
    pub fn active(&self) -> impl Iterator<Item = &Alarm> + '_ {
        self.alarms.iter().filter(|alarm| alarm.is_active())
    }

    /// Every alarm ever opened, oldest first.
    pub fn all(&self) -> &[Alarm] {
        &self.alarms
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::super::detector::ThresholdDetector;
    use super::*;

    const T0: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);
    const WINDOW: Duration = Duration::from_secs(30);

    fn at(secs: i64) -> OffsetDateTime {
        T0 + time::Duration::seconds(secs)
    }

    /// Status of a detector whose condition has held from `since` to `now`.
    fn met(since: i64, now: i64) -> ThresholdStatus {
        let mut detector = ThresholdDetector::new(AlarmKind::Leak);
        detector.update(true, None, at(since));
        detector.update(true, None, at(now));
        *detector.status()
    }

    fn idle() -> ThresholdStatus {
        ThresholdStatus::default()
    }

    #[test]
    fn should_not_open_before_window_elapses() {
        let mut ledger = AlarmLedger::new();

        let event = ledger.reconcile(AlarmKind::Leak, &met(0, 29), WINDOW, 1.0, at(29));

        assert_eq!(event, None);
        assert!(ledger.all().is_empty());
    }

    #[test]
    fn should_open_once_window_elapses() {
        let mut ledger = AlarmLedger::new();

        let event = ledger.reconcile(AlarmKind::Leak, &met(0, 30), WINDOW, 1.5, at(30));

        let Some(AlarmEvent::Opened(alarm)) = event else {
            panic!("expected an opened alarm, got {event:?}");
        };
        assert_eq!(alarm.kind(), AlarmKind::Leak);
        assert_eq!(alarm.start_time(), at(0));
        assert_eq!(alarm.trigger_value(), 1.5);
        assert!(alarm.is_active());
        assert_eq!(ledger.active_for(AlarmKind::Leak), Some(&alarm));
    }

    #[test]
    fn should_not_open_second_alarm_while_one_is_active() {
        let mut ledger = AlarmLedger::new();
        ledger.reconcile(AlarmKind::Leak, &met(0, 30), WINDOW, 1.0, at(30));

        let event = ledger.reconcile(AlarmKind::Leak, &met(0, 45), WINDOW, 2.0, at(45));

        assert_eq!(event, None);
        assert_eq!(ledger.all().len(), 1);
        assert_eq!(ledger.active().count(), 1);
    }

    #[test]
    fn should_keep_kinds_independent() {
        let mut ledger = AlarmLedger::new();

        ledger.reconcile(AlarmKind::Leak, &met(0, 30), WINDOW, 1.0, at(30));
        ledger.reconcile(AlarmKind::NoFlow, &met(0, 30), WINDOW, 0.0, at(30));

        assert_eq!(ledger.active().count(), 2);
    }

    #[test]
    fn should_close_when_condition_clears() {
        let mut ledger = AlarmLedger::new();
        ledger.reconcile(AlarmKind::Leak, &met(0, 30), WINDOW, 1.0, at(30));

        let event = ledger.reconcile(AlarmKind::Leak, &idle(), WINDOW, 0.0, at(31));

        let Some(AlarmEvent::Closed(alarm)) = event else {
            panic!("expected a closed alarm, got {event:?}");
        };
        assert_eq!(alarm.end_time(), Some(at(31)));
        assert!(!alarm.is_active());
        assert_eq!(ledger.active_for(AlarmKind::Leak), None);
        assert_eq!(ledger.all(), &[alarm]);
    }

    #[test]
    fn should_do_nothing_when_idle_without_active_alarm() {
        let mut ledger = AlarmLedger::new();

        assert_eq!(
            ledger.reconcile(AlarmKind::Burst, &idle(), WINDOW, 0.0, at(0)),
            None
        );
    }

    #[test]
    fn should_not_touch_closed_alarm_when_new_one_opens() {
        let mut ledger = AlarmLedger::new();
        ledger.reconcile(AlarmKind::Leak, &met(0, 30), WINDOW, 1.0, at(30));
        ledger.reconcile(AlarmKind::Leak, &idle(), WINDOW, 0.0, at(31));
        let closed = ledger.all()[0];

        ledger.reconcile(AlarmKind::Leak, &met(40, 70), WINDOW, 3.0, at(70));
        ledger.reconcile(AlarmKind::Leak, &idle(), WINDOW, 0.0, at(80));

        let alarms = ledger.all();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0], closed);
        assert_ne!(alarms[0].id(), alarms[1].id());
        assert_eq!(alarms[1].end_time(), Some(at(80)));
    }

    #[test]
    fn should_open_immediately_with_zero_window() {
        let mut ledger = AlarmLedger::new();

        let event = ledger.reconcile(AlarmKind::Burst, &met(5, 5), Duration::ZERO, 0.2, at(5));

        assert!(matches!(event, Some(AlarmEvent::Opened(_))));
    }
}
