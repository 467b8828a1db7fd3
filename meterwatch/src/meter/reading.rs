use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;

/// Number of readings retained before the oldest are evicted.
pub const READING_LOG_CAPACITY: usize = 100;

/// Identifier assigned to each reading in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadingId(u64);

impl ReadingId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReadingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reading-{}", self.0)
    }
}

/// A recorded sample of the cumulative meter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    id: ReadingId,
    timestamp: OffsetDateTime,
    cumulative_value: f64,
    consumption_since_last: f64,
}

impl Reading {
    pub fn id(&self) -> ReadingId {
        self.id
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Total meter value in m³.
    pub fn cumulative_value(&self) -> f64 {
        self.cumulative_value
    }

    /// Difference from the previous reading (or from the baseline for
    /// the first one). Negative under reverse flow.
    pub fn consumption_since_last(&self) -> f64 {
        self.consumption_since_last
    }
}

/// Bounded, newest-first history of readings.
///
/// Backed by a ring buffer: appends push at the front and evict from
/// the back once [`capacity`](Self::capacity) readings are held, so the
/// log never reallocates after warm-up.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingLog {
    readings: VecDeque<Reading>,
    capacity: usize,
    baseline: f64,
    next_id: u64,
}

impl Default for ReadingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingLog {
    /// An empty log with the standard capacity and a zero baseline.
    pub fn new() -> Self {
        Self::with_capacity(READING_LOG_CAPACITY, 0.0)
    }

    /// An empty log whose first reading's consumption is measured
    /// against `baseline` instead of zero.
    pub fn with_baseline(baseline: f64) -> Self {
        Self::with_capacity(READING_LOG_CAPACITY, baseline)
    }

    pub fn with_capacity(capacity: usize, baseline: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            baseline,
            next_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Record a new cumulative value and return the stored reading.
    pub fn append(&mut self, value: f64, timestamp: OffsetDateTime) -> Reading {
        let previous = self
            .newest()
            .map_or(self.baseline, |r| r.cumulative_value);

        let reading = Reading {
            id: ReadingId(self.next_id),
            timestamp,
            cumulative_value: value,
            consumption_since_last: value - previous,
        };
        self.next_id += 1;

        if self.readings.len() == self.capacity {
            self.readings.pop_back();
        }
        self.readings.push_front(reading);

        reading
    }

    pub fn newest(&self) -> Option<&Reading> {
        self.readings.front()
    }

    /// All retained readings, newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Reading> + Clone + '_ {
        self.readings.iter()
    }

    /// Readings taken within `window` before `now`, newest first.
    ///
    /// The boundary is inclusive. An empty iterator means there is no
    /// data in the window.
    pub fn windowed(
        &self,
        now: OffsetDateTime,
        window: Duration,
    ) -> impl DoubleEndedIterator<Item = &Reading> + Clone + '_ {
        let cutoff = time::Duration::try_from(window)
            .ok()
            .and_then(|w| now.checked_sub(w));

        self.readings
            .iter()
            .filter(move |r| cutoff.is_none_or(|c| r.timestamp >= c))
    }

    /// The oldest reading still inside the window.
    pub fn oldest_in_window(&self, now: OffsetDateTime, window: Duration) -> Option<&Reading> {
        self.windowed(now, window).next_back()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const T0: OffsetDateTime = datetime!(2025-03-01 12:00 UTC);

    fn at(secs: i64) -> OffsetDateTime {
        T0 + time::Duration::seconds(secs)
    }

    #[test]
    fn should_measure_first_reading_against_baseline() {
        let mut log = ReadingLog::with_baseline(10.0);

        let reading = log.append(12.5, at(0));

        assert_eq!(reading.consumption_since_last(), 2.5);
    }

    #[test]
    fn should_measure_consumption_against_newest_reading() {
        let mut log = ReadingLog::new();

        log.append(1.0, at(0));
        let reading = log.append(0.75, at(10));

        assert_eq!(reading.consumption_since_last(), -0.25);
        assert_eq!(log.newest().map(Reading::cumulative_value), Some(0.75));
    }

    #[test]
    fn should_assign_increasing_ids() {
        let mut log = ReadingLog::new();

        let first = log.append(1.0, at(0));
        let second = log.append(2.0, at(1));

        assert!(second.id() > first.id());
    }

    #[test]
    fn should_evict_oldest_reading_at_capacity() {
        let mut log = ReadingLog::new();

        for i in 0..(READING_LOG_CAPACITY as i64 + 5) {
            log.append(i as f64, at(i));
        }

        assert_eq!(log.len(), READING_LOG_CAPACITY);
        assert_eq!(log.newest().map(Reading::cumulative_value), Some(104.0));
        assert_eq!(log.iter().last().map(Reading::cumulative_value), Some(5.0));
    }

    #[test]
    fn should_iterate_newest_first() {
        let mut log = ReadingLog::new();
        log.append(1.0, at(0));
        log.append(2.0, at(1));
        log.append(3.0, at(2));

        let values: Vec<f64> = log.iter().map(Reading::cumulative_value).collect();

        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn should_clamp_zero_capacity_to_one() {
        let mut log = ReadingLog::with_capacity(0, 0.0);

        log.append(1.0, at(0));
        log.append(2.0, at(1));

        assert_eq!(log.len(), 1);
        assert_eq!(log.newest().map(Reading::cumulative_value), Some(2.0));
    }

    #[test]
    fn should_include_window_boundary() {
        let mut log = ReadingLog::new();
        log.append(1.0, at(0));
        log.append(2.0, at(10));
        log.append(3.0, at(20));

        let oldest = log.oldest_in_window(at(30), Duration::from_secs(20));

        assert_eq!(oldest.map(Reading::cumulative_value), Some(2.0));
        assert_eq!(log.windowed(at(30), Duration::from_secs(20)).count(), 2);
    }

    #[test]
    fn should_return_empty_window_when_readings_are_stale() {
        let mut log = ReadingLog::new();
        log.append(1.0, at(0));

        let mut window = log.windowed(at(100), Duration::from_secs(30));

        assert!(window.next().is_none());
        assert!(log.oldest_in_window(at(100), Duration::from_secs(30)).is_none());
    }

    #[test]
    fn should_restart_windowed_view() {
        let mut log = ReadingLog::new();
        log.append(1.0, at(0));
        log.append(2.0, at(1));

        let window = log.windowed(at(1), Duration::from_secs(5));
        let first_pass: Vec<_> = window.clone().collect();
        let second_pass: Vec<_> = window.collect();

        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn should_take_everything_when_window_exceeds_representable_time() {
        let mut log = ReadingLog::new();
        log.append(1.0, at(0));

        let count = log.windowed(at(1), Duration::from_secs(u64::MAX)).count();

        assert_eq!(count, 1);
    }
}
