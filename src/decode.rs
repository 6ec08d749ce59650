// src/decode.rs

//! Decodes raw feed messages into canonical [`Reading`]s.
//!
//! The backend delivers JSON in two shapes, `{ "data": { ... } }` from the
//! acquisition feed and the bare fields from the listener feeds, and both
//! must decode identically. Payloads may also carry an `error` field instead
//! of data; that is an expected condition (e.g. a sensor offline) and is
//! reported as [`DecodeError::ServerReported`], never as a transport fault.

use crate::feed::types::SubscriptionKey;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Placeholder for a sensor that did not report a name.
pub const UNKNOWN_SENSOR: &str = "Unknown Sensor";
/// Placeholder for a missing location.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
/// Placeholder for a missing instrument name.
pub const UNKNOWN_INSTRUMENT: &str = "Unknown Instrument";
/// Placeholder for a missing part/serial number.
pub const UNKNOWN_PART: &str = "N/A";

/// Why a message could not be decoded into a [`Reading`].
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload was not parseable as a JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// A mandatory field (`sensor_id` or `channel`) was absent. The message
    /// is dropped; nothing is stored.
    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),
    /// The peer reported an error inside a valid payload. Informational;
    /// must not trigger reconnection.
    #[error("server reported: {0}")]
    ServerReported(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedPayload(e.to_string())
    }
}

/// Acceptable min/max bounds for one instrument. Each bound is independently
/// optional; an unset bound never flags a value out of range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Limits {
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub min_humidity: Option<f64>,
    pub max_humidity: Option<f64>,
}

/// Identity of the instrument a reading came from, with display defaults
/// already applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentMeta {
    pub instrument_name: String,
    pub part_number: String,
    pub serial_number: String,
    pub location: String,
}

impl Default for InstrumentMeta {
    fn default() -> Self {
        Self {
            instrument_name: UNKNOWN_INSTRUMENT.to_string(),
            part_number: UNKNOWN_PART.to_string(),
            serial_number: UNKNOWN_PART.to_string(),
            location: UNKNOWN_LOCATION.to_string(),
        }
    }
}

/// One decoded telemetry sample.
///
/// Numeric telemetry is never fabricated: a field the instrument did not
/// report numerically (the server emits `"No Calibration Certificate"` for
/// uncorrected channels) decodes to `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub sensor_id: i64,
    pub channel: i64,
    pub sensor_name: String,
    pub location: String,
    pub temperature: Option<f64>,
    pub corrected_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub corrected_humidity: Option<f64>,
    /// Instrument-local timestamp, verbatim from the wire. Nullable.
    pub timestamp: Option<String>,
    pub limits: Limits,
    pub instrument: InstrumentMeta,
}

impl Reading {
    /// The sensor/channel key this reading belongs to in a view-state map.
    /// A new reading fully replaces the previous entry for the same key.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::channel(self.sensor_id, self.channel)
    }
}

/// Decode one raw feed message.
///
/// Unwraps the optional one-level `data` envelope, requires `sensor_id` and
/// `channel`, and applies display defaults for the optional text fields.
pub fn decode(raw: &str) -> Result<Reading, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let envelope = value
        .as_object()
        .ok_or_else(|| DecodeError::MalformedPayload("payload is not a JSON object".into()))?;

    if let Some(error) = envelope.get("error").and_then(Value::as_str) {
        return Err(DecodeError::ServerReported(error.to_string()));
    }

    // Both `{ data: { ... } }` and the bare fields are accepted.
    let body = envelope
        .get("data")
        .and_then(Value::as_object)
        .unwrap_or(envelope);

    let sensor_id = body
        .get("sensor_id")
        .and_then(Value::as_i64)
        .ok_or(DecodeError::MissingField("sensor_id"))?;
    let channel = body
        .get("channel")
        .and_then(Value::as_i64)
        .ok_or(DecodeError::MissingField("channel"))?;

    let info = body.get("thermo_info").and_then(Value::as_object);

    let limits = match info {
        Some(info) => Limits {
            min_temperature: num(info, "min_temperature"),
            max_temperature: num(info, "max_temperature"),
            min_humidity: num(info, "min_humidity"),
            max_humidity: num(info, "max_humidity"),
        },
        None => Limits::default(),
    };

    let instrument = match info {
        Some(info) => InstrumentMeta {
            instrument_name: text_or(info, "instrument_name", UNKNOWN_INSTRUMENT),
            part_number: text_or(info, "pn", UNKNOWN_PART),
            serial_number: text_or(info, "sn", UNKNOWN_PART),
            location: text_or(info, "instrument_location", UNKNOWN_LOCATION),
        },
        None => InstrumentMeta::default(),
    };

    Ok(Reading {
        sensor_id,
        channel,
        sensor_name: text_or(body, "sensor_name", UNKNOWN_SENSOR),
        location: text_or(body, "location", UNKNOWN_LOCATION),
        temperature: num(body, "temperature"),
        corrected_temperature: num(body, "corrected_temperature"),
        humidity: num(body, "humidity"),
        corrected_humidity: num(body, "corrected_humidity"),
        timestamp: body
            .get("date")
            .and_then(Value::as_str)
            .map(str::to_string),
        limits,
        instrument,
    })
}

/// Lenient numeric extraction: integers and floats pass through, anything
/// else (null, strings like `"No Calibration Certificate"`) becomes `None`.
fn num(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn text_or(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}
