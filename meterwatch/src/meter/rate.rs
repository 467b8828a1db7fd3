//! Flow rate derivation from cumulative readings.
//!
//! All rates are in m³/s. Every division is guarded: a non-positive
//! elapsed time yields zero (instantaneous) or no value (windowed),
//! never an infinity or NaN.

use std::time::Duration;

use time::OffsetDateTime;

use super::reading::ReadingLog;

/// Aggregates over the readings in one trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Live value minus the oldest in-window reading.
    pub total_consumption: f64,
    /// Time between the oldest in-window reading and now.
    pub elapsed: Duration,
    pub average_rate: f64,
}

fn rate_between(
    from_value: f64,
    from_time: OffsetDateTime,
    to_value: f64,
    to_time: OffsetDateTime,
) -> Option<f64> {
    let elapsed_s = (to_time - from_time).as_seconds_f64();
    if elapsed_s <= 0.0 {
        return None;
    }

    let rate = (to_value - from_value) / elapsed_s;
    rate.is_finite().then_some(rate)
}

/// Instantaneous flow rate.
///
/// Uses the two most recent readings when there are at least two.
/// With exactly one, compares it against the live value at `now`.
/// Falls back to zero when neither gives a positive time span.
pub fn estimate(log: &ReadingLog, live_value: f64, now: OffsetDateTime) -> f64 {
    let mut readings = log.iter();

    let rate = match (readings.next(), readings.next()) {
        (Some(newest), Some(previous)) => rate_between(
            previous.cumulative_value(),
            previous.timestamp(),
            newest.cumulative_value(),
            newest.timestamp(),
        ),
        (Some(newest), None) => rate_between(
            newest.cumulative_value(),
            newest.timestamp(),
            live_value,
            now,
        ),
        (None, _) => None,
    };

    rate.unwrap_or(0.0)
}

/// Average rate over `window`, measured from the oldest in-window
/// reading to the live value.
///
/// `None` when the window holds no readings or no time has passed
/// since the oldest of them.
pub fn window_stats(
    log: &ReadingLog,
    live_value: f64,
    now: OffsetDateTime,
    window: Duration,
) -> Option<WindowStats> {
    let oldest = log.oldest_in_window(now, window)?;
    let average_rate = rate_between(
        oldest.cumulative_value(),
        oldest.timestamp(),
        live_value,
        now,
    )?;
    let elapsed = Duration::try_from(now - oldest.timestamp()).ok()?;

    Some(WindowStats {
        total_consumption: live_value - oldest.cumulative_value(),
        elapsed,
        average_rate,
    })
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

    #[test]
    fn should_use_two_newest_readings() {
        let mut log = ReadingLog::new();
        log.append(0.0, at(0));
        log.append(1.0, at(10));
        log.append(3.0, at(20));

        // Live value is ignored once two readings exist.
        assert_eq!(estimate(&log, 100.0, at(25)), 0.2);
    }

    #[test]
    fn should_use_live_value_with_single_reading() {
        let mut log = ReadingLog::new();
        log.append(5.0, at(0));

        assert_eq!(estimate(&log, 6.0, at(4)), 0.25);
    }

    #[test]
    fn should_be_zero_without_readings() {
        assert_eq!(estimate(&ReadingLog::new(), 42.0, at(0)), 0.0);
    }

    #[test_case(0 ; "same instant")]
    #[test_case(-5 ; "clock went backwards")]
    fn should_be_zero_for_non_positive_reading_gap(gap_s: i64) {
        let mut log = ReadingLog::new();
        log.append(1.0, at(10));
        log.append(2.0, at(10 + gap_s));

        let rate = estimate(&log, 2.0, at(20));

        assert_eq!(rate, 0.0);
    }

    #[test_case(0 ; "same instant")]
    #[test_case(-5 ; "reading from the future")]
    fn should_be_zero_for_non_positive_live_gap(offset_s: i64) {
        let mut log = ReadingLog::new();
        log.append(1.0, at(10));

        assert_eq!(estimate(&log, 2.0, at(10 + offset_s)), 0.0);
    }

    #[test]
    fn should_average_from_oldest_in_window_to_live_value() {
        let mut log = ReadingLog::new();
        log.append(0.0, at(0));
        log.append(1.0, at(10));
        log.append(2.0, at(20));

        let stats = window_stats(&log, 4.0, at(30), Duration::from_secs(20)).unwrap();

        assert_eq!(stats.total_consumption, 3.0);
        assert_eq!(stats.elapsed, Duration::from_secs(20));
        assert_eq!(stats.average_rate, 0.15);
    }

    #[test]
    fn should_have_no_stats_for_empty_window() {
        let mut log = ReadingLog::new();
        log.append(0.0, at(0));

        assert_eq!(window_stats(&log, 1.0, at(60), Duration::from_secs(30)), None);
    }

    #[test]
    fn should_have_no_stats_when_no_time_elapsed() {
        let mut log = ReadingLog::new();
        log.append(0.0, at(0));

        assert_eq!(window_stats(&log, 1.0, at(0), Duration::from_secs(30)), None);
    }

    #[test]
    fn should_report_negative_average_for_reverse_flow() {
        let mut log = ReadingLog::new();
        log.append(10.0, at(0));

        let stats = window_stats(&log, 9.0, at(20), Duration::from_secs(30)).unwrap();

        assert_eq!(stats.average_rate, -0.05);
    }
}
