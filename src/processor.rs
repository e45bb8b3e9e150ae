//! Chunk normalization: timestamps, type coercion, canonical column names

use crate::config::SchemaConfig;
use crate::frame::{Frame, Value};
use chrono::{NaiveDate, NaiveDateTime};

/// Timestamp format written by the sensor producers
const PRIMARY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fallback formats tried when the primary parse fails
const FLEXIBLE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Canonical column names for downstream consumers
const COLUMN_RENAMES: &[(&str, &str)] = &[
    ("temp", "temperature"),
    ("co", "co_ppm"),
    ("lpg", "lpg_ppm"),
    ("smoke", "smoke_ppm"),
    ("light", "light_detected"),
    ("motion", "motion_detected"),
];

pub struct Processor<'a> {
    schema: &'a SchemaConfig,
}

impl<'a> Processor<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self { schema }
    }

    /// Normalize a validated chunk. Pure transformation; never fails.
    /// Running it twice is a fixed point.
    pub fn process(&self, frame: Frame) -> Frame {
        let frame = parse_timestamp(frame);
        let frame = self.ensure_numeric_columns(frame);
        let frame = self.ensure_boolean_columns(frame);
        let frame = rename_columns(frame);

        log::info!(
            "🧪 Chunk processed ({} rows, {} columns)",
            frame.num_rows(),
            frame.num_columns()
        );
        frame
    }

    /// Re-coerce numeric sensor columns (idempotent with the validator).
    fn ensure_numeric_columns(&self, mut frame: Frame) -> Frame {
        for field in &self.schema.numeric_fields {
            if let Some(column) = frame.column(field) {
                let coerced: Vec<Value> = column.iter().map(Value::coerce_numeric).collect();
                frame.set_column(field, coerced);
            }
        }
        frame
    }

    /// Canonicalize boolean event columns. Values outside the accepted
    /// enumeration become null; validation has already rejected them for
    /// chunks that reach this stage.
    fn ensure_boolean_columns(&self, mut frame: Frame) -> Frame {
        for field in &self.schema.boolean_fields {
            if let Some(column) = frame.column(field) {
                let coerced: Vec<Value> = column.iter().map(coerce_boolean).collect();
                frame.set_column(field, coerced);
            }
        }
        frame
    }
}

/// Parse the timestamp column: primary fixed format first, then the flexible
/// fallback set; if the column still will not parse, leave it untouched.
fn parse_timestamp(mut frame: Frame) -> Frame {
    let Some(column) = frame.column("timestamp").map(<[Value]>::to_vec) else {
        log::warn!("No 'timestamp' column in chunk, skipping timestamp parse");
        return frame;
    };

    if let Some(parsed) = parse_column(&column, parse_primary) {
        frame.set_column("timestamp", parsed);
        log::info!("Timestamp parsed successfully");
        return frame;
    }

    log::warn!("Primary timestamp parse failed, trying flexible parse");
    if let Some(parsed) = parse_column(&column, parse_flexible) {
        frame.set_column("timestamp", parsed);
        log::info!("Timestamp parsed with flexible format");
        return frame;
    }

    log::error!("Failed to parse timestamp column, leaving values as-is");
    frame
}

/// Parse every non-null value with `parse`; `None` if any value refuses.
/// Already-parsed `Time` values and nulls pass through.
fn parse_column<F>(column: &[Value], parse: F) -> Option<Vec<Value>>
where
    F: Fn(&str) -> Option<NaiveDateTime>,
{
    column
        .iter()
        .map(|value| match value {
            Value::Null => Some(Value::Null),
            Value::Time(t) => Some(Value::Time(*t)),
            Value::Str(s) => parse(s.trim()).map(Value::Time),
            _ => None,
        })
        .collect()
}

pub(crate) fn parse_flexible(s: &str) -> Option<NaiveDateTime> {
    for format in FLEXIBLE_TIMESTAMP_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    // date-only values resolve to midnight
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub(crate) fn parse_primary(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, PRIMARY_TIMESTAMP_FORMAT).ok()
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Float(f) if *f == 1.0 => Value::Bool(true),
        Value::Float(f) if *f == 0.0 => Value::Bool(false),
        Value::Str(s) => {
            let s = s.trim();
            if s == "1" || s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s == "0" || s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}

fn rename_columns(mut frame: Frame) -> Frame {
    for (from, to) in COLUMN_RENAMES {
        frame.rename_column(from, to);
    }
    frame
}
