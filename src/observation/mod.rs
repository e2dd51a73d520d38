//! # Observation Module
//!
//! The per-cycle observation record and the builder that assembles it.
//!
//! This module handles:
//! - The fixed, ordered field schema ([`schema::SCHEMA`])
//! - The immutable [`Observation`] handed to the recorder and submission client
//! - Building an observation from raw sensor readings ([`builder`])

pub mod builder;
pub mod schema;

use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Serialize, Serializer};
use tracing::info;

use schema::{FieldKey, FieldKind, FieldSpec, FIELD_COUNT, SCHEMA};

/// Float placeholder for a value that could not be measured.
pub const MISSING_FLOAT: f64 = -9999.0;

/// Integer placeholder for a value that could not be measured.
pub const MISSING_INTEGER: i64 = -9999;

/// A single numeric field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl FieldValue {
    /// Placeholder value for the given kind.
    #[must_use]
    pub fn missing(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Float => FieldValue::Float(MISSING_FLOAT),
            FieldKind::Integer => FieldValue::Integer(MISSING_INTEGER),
        }
    }

    /// Converts the value to the representation required by `kind`.
    ///
    /// Floats stored into integer fields are truncated toward zero.
    #[must_use]
    pub fn coerce(self, kind: FieldKind) -> Self {
        match (self, kind) {
            (FieldValue::Float(v), FieldKind::Integer) => FieldValue::Integer(v as i64),
            (FieldValue::Integer(v), FieldKind::Float) => FieldValue::Float(v as f64),
            (value, _) => value,
        }
    }

    /// Value as `f64`, regardless of kind.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            FieldValue::Float(v) => v,
            FieldValue::Integer(v) => v as f64,
        }
    }

    /// Whether this is the "not measured" placeholder.
    #[must_use]
    pub fn is_missing(self) -> bool {
        match self {
            FieldValue::Float(v) => v == MISSING_FLOAT,
            FieldValue::Integer(v) => v == MISSING_INTEGER,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Integer(v) => serializer.serialize_i64(*v),
        }
    }
}

/// One timestamped, keyed observation produced per wake cycle.
///
/// Every schema field is always present; values that could not be measured
/// carry the [`MISSING_FLOAT`] / [`MISSING_INTEGER`] placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    timestamp: DateTime<FixedOffset>,
    device_id: String,
    values: [FieldValue; FIELD_COUNT],
}

impl Observation {
    /// Creates an observation with every field set to its placeholder.
    pub fn new(timestamp: DateTime<FixedOffset>, device_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            device_id: device_id.into(),
            values: SCHEMA.map(|spec| FieldValue::missing(spec.kind)),
        }
    }

    /// Sets a field, converting the value to the field's schema kind.
    pub fn set(&mut self, key: FieldKey, value: impl Into<FieldValue>) {
        self.values[key.index()] = value.into().coerce(key.spec().kind);
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn get(&self, key: FieldKey) -> FieldValue {
        self.values[key.index()]
    }

    /// Local time at which the cycle started.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// ISO-8601 timestamp with millisecond precision.
    #[must_use]
    pub fn created_at(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Stable hardware identifier of the station.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Fields in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldSpec, FieldValue)> + '_ {
        SCHEMA.iter().zip(self.values.iter().copied())
    }

    /// Logs every field with its label.
    pub fn log_summary(&self) {
        info!("Observation {} from {}", self.created_at(), self.device_id);
        for (spec, value) in self.fields() {
            info!("  {}: {}", spec.label, value);
        }
    }
}
