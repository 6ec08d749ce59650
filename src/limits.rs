// src/limits.rs

//! Classifies telemetry values against per-instrument limits.
//!
//! Unset bounds default to negative/positive infinity, so a value with no
//! limits configured is always in range. Values that were never received (or are NaN) get no
//! classification at all; "no value" is not an implicit pass.

use crate::decode::Reading;
use serde::Serialize;

/// Verdict for one value against one limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    InRange,
    OutOfRange,
}

impl RangeStatus {
    pub fn is_out_of_range(self) -> bool {
        self == Self::OutOfRange
    }
}

/// Classify `value` against `[min, max]`.
///
/// Out of range iff `value < min || value > max`; `None` bounds mean
/// unbounded on that side. NaN yields `None`; the caller must treat a
/// missing measurement as unclassified, not as in or out of range.
pub fn classify(value: f64, min: Option<f64>, max: Option<f64>) -> Option<RangeStatus> {
    if value.is_nan() {
        return None;
    }
    let min = min.unwrap_or(f64::NEG_INFINITY);
    let max = max.unwrap_or(f64::INFINITY);
    if value < min || value > max {
        Some(RangeStatus::OutOfRange)
    } else {
        Some(RangeStatus::InRange)
    }
}

/// Per-field verdicts for one [`Reading`]. `None` means the field carried
/// no numeric value and was left unclassified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadingEvaluation {
    pub temperature: Option<RangeStatus>,
    pub corrected_temperature: Option<RangeStatus>,
    pub humidity: Option<RangeStatus>,
    pub corrected_humidity: Option<RangeStatus>,
}

impl ReadingEvaluation {
    /// True if any classified field is out of range.
    pub fn any_out_of_range(&self) -> bool {
        [
            self.temperature,
            self.corrected_temperature,
            self.humidity,
            self.corrected_humidity,
        ]
        .iter()
        .any(|v| matches!(v, Some(RangeStatus::OutOfRange)))
    }
}

/// Evaluate every telemetry field of a reading against its own limit pair.
/// Raw and corrected temperature share the temperature limits; likewise for
/// humidity.
pub fn evaluate(reading: &Reading) -> ReadingEvaluation {
    let limits = &reading.limits;
    let against_temp = |v: Option<f64>| {
        v.and_then(|v| classify(v, limits.min_temperature, limits.max_temperature))
    };
    let against_hum =
        |v: Option<f64>| v.and_then(|v| classify(v, limits.min_humidity, limits.max_humidity));

    ReadingEvaluation {
        temperature: against_temp(reading.temperature),
        corrected_temperature: against_temp(reading.corrected_temperature),
        humidity: against_hum(reading.humidity),
        corrected_humidity: against_hum(reading.corrected_humidity),
    }
}
