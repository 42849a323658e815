//! Prediction history normalization.
//!
//! The history endpoint has served records under two naming conventions
//! (`createdAt`/`value`/`type` and `created_at`/`prediction_value`/
//! `prediction_type`). Each raw record is classified by which key family it
//! carries, then resolved field by field into one [`HistoryRecord`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mode tag used when a record carries none.
pub const UNKNOWN_MODE: &str = "unknown";

/// Canonical history record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl HistoryRecord {
    /// Calendar day the record was created, if the timestamp is readable.
    pub fn created_date(&self) -> Option<NaiveDate> {
        parse_timestamp(self.created_at.as_deref()?)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Cleaned values from one key family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    pub created_at: Option<String>,
    pub value: Option<f64>,
    pub kind: Option<String>,
}

impl FieldSet {
    fn is_empty(&self) -> bool {
        self.created_at.is_none() && self.value.is_none() && self.kind.is_none()
    }

    /// Per-field fallback: keep ours, fill gaps from `other`.
    fn or(self, other: FieldSet) -> FieldSet {
        FieldSet {
            created_at: self.created_at.or(other.created_at),
            value: self.value.or(other.value),
            kind: self.kind.or(other.kind),
        }
    }

    fn into_record(self) -> HistoryRecord {
        HistoryRecord {
            created_at: self.created_at,
            value: self.value.unwrap_or(0.0),
            kind: self.kind.unwrap_or_else(|| UNKNOWN_MODE.to_string()),
        }
    }
}

/// A history record as served, classified by key family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawFields")]
pub enum RawHistoryRecord {
    /// Only `createdAt` / `value` / `type`
    Canonical(FieldSet),
    /// Only `created_at` / `prediction_value` / `prediction_type`
    Legacy(FieldSet),
    /// Keys from both families
    Mixed { canonical: FieldSet, legacy: FieldSet },
    /// None of the expected keys
    Unrecognized,
}

impl RawHistoryRecord {
    pub fn normalize(self) -> HistoryRecord {
        match self {
            RawHistoryRecord::Canonical(fields) | RawHistoryRecord::Legacy(fields) => {
                fields.into_record()
            }
            RawHistoryRecord::Mixed { canonical, legacy } => canonical.or(legacy).into_record(),
            RawHistoryRecord::Unrecognized => FieldSet::default().into_record(),
        }
    }
}

impl From<HistoryRecord> for RawHistoryRecord {
    fn from(record: HistoryRecord) -> Self {
        RawHistoryRecord::Canonical(FieldSet {
            created_at: record.created_at,
            value: Some(record.value),
            kind: Some(record.kind),
        })
    }
}

/// Wire shape with every key either family may use.
#[derive(Debug, Default, Deserialize)]
struct RawFields {
    #[serde(rename = "createdAt", default)]
    created_at_camel: Option<Value>,
    #[serde(rename = "created_at", default)]
    created_at_snake: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    prediction_value: Option<Value>,
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    prediction_type: Option<Value>,
}

impl From<RawFields> for RawHistoryRecord {
    fn from(raw: RawFields) -> Self {
        let canonical = FieldSet {
            created_at: text(raw.created_at_camel),
            value: number(raw.value),
            kind: text(raw.kind),
        };
        let legacy = FieldSet {
            created_at: text(raw.created_at_snake),
            value: number(raw.prediction_value),
            kind: text(raw.prediction_type),
        };

        match (canonical.is_empty(), legacy.is_empty()) {
            (false, true) => RawHistoryRecord::Canonical(canonical),
            (true, false) => RawHistoryRecord::Legacy(legacy),
            (false, false) => RawHistoryRecord::Mixed { canonical, legacy },
            (true, true) => RawHistoryRecord::Unrecognized,
        }
    }
}

/// Non-empty strings only.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Finite numbers, or strings holding one.
fn number(value: Option<Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Normalize a batch, keeping order and every record.
pub fn normalize_history<I>(raw: I) -> Vec<HistoryRecord>
where
    I: IntoIterator<Item = RawHistoryRecord>,
{
    raw.into_iter().map(RawHistoryRecord::normalize).collect()
}
