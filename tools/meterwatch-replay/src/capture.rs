//! Meter capture parsing.
//!
//! A capture is a CSV file with a `time_s,reading` header: seconds since
//! the start of the recording and the cumulative register value in m³.

use std::{fs::File, io::Read, path::Path};

use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Wall-clock instant the capture's `time_s = 0` maps onto.
pub const CAPTURE_ORIGIN: OffsetDateTime = OffsetDateTime::UNIX_EPOCH;

/// Instant `time_s` seconds after the capture origin, if representable.
pub fn timestamp(time_s: f64) -> Option<OffsetDateTime> {
    Duration::checked_seconds_f64(time_s).and_then(|offset| CAPTURE_ORIGIN.checked_add(offset))
}

/// Seconds since the capture origin.
pub fn capture_time(instant: OffsetDateTime) -> f64 {
    (instant - CAPTURE_ORIGIN).as_seconds_f64()
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to read capture: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open capture: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture has no samples")]
    Empty,

    #[error("row {row}: non-finite value")]
    NonFinite { row: usize },

    #[error("row {row}: time {time_s}s is outside the representable range")]
    OutOfRange { row: usize, time_s: f64 },

    #[error("row {row}: time {time_s}s goes backwards")]
    OutOfOrder { row: usize, time_s: f64 },
}

/// One recorded register value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Sample {
    pub time_s: f64,
    pub reading: f64,
}

/// Samples in time order. Never empty.
#[derive(Debug, Clone)]
pub struct Capture {
    samples: Vec<Sample>,
}

impl Capture {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CaptureError> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut samples: Vec<Sample> = Vec::new();

        for (index, record) in csv.deserialize().enumerate() {
            let sample: Sample = record?;
            let row = index + 1;

            if !sample.time_s.is_finite() || !sample.reading.is_finite() {
                return Err(CaptureError::NonFinite { row });
            }
            if timestamp(sample.time_s).is_none() {
                return Err(CaptureError::OutOfRange {
                    row,
                    time_s: sample.time_s,
                });
            }
            if samples.last().is_some_and(|prev| sample.time_s < prev.time_s) {
                return Err(CaptureError::OutOfOrder {
                    row,
                    time_s: sample.time_s,
                });
            }
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn first(&self) -> Sample {
        self.samples[0]
    }

    pub fn end_time(&self) -> f64 {
        self.samples[self.samples.len() - 1].time_s
    }

    /// Register value at `time_s`, linearly interpolated between the
    /// surrounding samples and held flat outside the recorded span.
    pub fn value_at(&self, time_s: f64) -> f64 {
        let next = self.samples.partition_point(|s| s.time_s <= time_s);
        if next == 0 {
            return self.samples[0].reading;
        }
        let before = self.samples[next - 1];
        let Some(after) = self.samples.get(next) else {
            return before.reading;
        };

        let span = after.time_s - before.time_s;
        if span <= 0.0 {
            return before.reading;
        }
        let fraction = (time_s - before.time_s) / span;
        before.reading + (after.reading - before.reading) * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn capture(text: &str) -> Result<Capture, CaptureError> {
        Capture::from_reader(text.as_bytes())
    }

    #[test]
    fn parses_rows_in_order() {
        let capture = capture("time_s,reading\n0,12.5\n1.5, 12.75\n3,13\n").unwrap();

        assert_eq!(capture.samples().len(), 3);
        assert_eq!(
            capture.samples()[1],
            Sample {
                time_s: 1.5,
                reading: 12.75
            }
        );
        assert_eq!(capture.end_time(), 3.0);
    }

    #[test]
    fn rejects_empty_capture() {
        assert!(matches!(capture("time_s,reading\n"), Err(CaptureError::Empty)));
    }

    #[test]
    fn rejects_time_going_backwards() {
        let result = capture("time_s,reading\n0,1\n5,2\n4,3\n");
        assert!(matches!(result, Err(CaptureError::OutOfOrder { row: 3, .. })));
    }

    #[test_case("1e12" ; "past the calendar")]
    #[test_case("-1e12" ; "before the calendar")]
    #[test_case("1e20" ; "past the duration range")]
    fn rejects_unrepresentable_times(time_s: &str) {
        let result = capture(&format!("time_s,reading\n0,1\n{time_s},2\n"));
        assert!(matches!(result, Err(CaptureError::OutOfRange { row: 2, .. })));
    }

    #[test]
    fn maps_capture_time_onto_origin() {
        let instant = timestamp(12.5).unwrap();
        assert_eq!(instant, CAPTURE_ORIGIN + Duration::milliseconds(12_500));
        assert!((capture_time(instant) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(matches!(
            capture("time_s,reading\n0,abc\n"),
            Err(CaptureError::Csv(_))
        ));
    }

    #[test_case(-1.0, 10.0 ; "before first sample")]
    #[test_case(0.0, 10.0 ; "at first sample")]
    #[test_case(5.0, 15.0 ; "halfway")]
    #[test_case(10.0, 20.0 ; "at second sample")]
    #[test_case(15.0, 20.0 ; "flat span")]
    #[test_case(25.0, 20.0 ; "after last sample")]
    fn interpolates_between_samples(time_s: f64, expected: f64) {
        let capture = capture("time_s,reading\n0,10\n10,20\n20,20\n").unwrap();
        assert!((capture.value_at(time_s) - expected).abs() < 1e-9);
    }
}
