//! Per-device statistics and fixed-width time-window averages

use crate::frame::{Frame, Value};
use crate::processor::{parse_flexible, parse_primary};
use std::collections::BTreeMap;

/// Measurement columns considered for device statistics, canonical and raw names
const NUMERIC_CANDIDATES: &[&str] = &[
    "co_ppm",
    "co",
    "humidity",
    "lpg_ppm",
    "lpg",
    "smoke_ppm",
    "smoke",
    "temperature",
    "temp",
];

/// Event columns considered for device statistics
const BOOLEAN_CANDIDATES: &[&str] = &["light_detected", "light", "motion_detected", "motion"];

const NUMERIC_STATS: &[&str] = &["mean", "min", "max", "std"];
const BOOLEAN_STATS: &[&str] = &["sum", "mean"];

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub by_device: Frame,
    pub by_time_window: Frame,
}

pub struct Aggregator {
    window_secs: i64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self { window_secs: 60 }
    }

    pub fn with_window_secs(window_secs: i64) -> Self {
        Self { window_secs }
    }

    pub fn aggregate(&self, frame: &Frame) -> AggregationResult {
        log::info!("Starting aggregation on chunk with {} rows", frame.num_rows());
        AggregationResult {
            by_device: aggregate_by_device(frame),
            by_time_window: self.aggregate_by_time_window(frame),
        }
    }

    /// Resample readings into fixed, calendar-anchored time buckets and
    /// compute the mean of every numeric column per bucket. Buckets with no
    /// rows are excluded.
    fn aggregate_by_time_window(&self, frame: &Frame) -> Frame {
        let Some(timestamps) = frame.column("timestamp") else {
            log::warn!("No 'timestamp' column, skipping time-window aggregation");
            return Frame::new();
        };

        let numeric_cols: Vec<String> = frame
            .column_names()
            .iter()
            .filter(|name| name.as_str() != "timestamp")
            .filter(|name| is_numeric_column(frame.column(name.as_str()).unwrap()))
            .cloned()
            .collect();

        if numeric_cols.is_empty() {
            log::warn!("No numeric columns found for time-window aggregation");
            return Frame::new();
        }

        // rows with unparseable timestamps are dropped
        let mut buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (row, value) in timestamps.iter().enumerate() {
            if let Some(epoch) = timestamp_epoch(value) {
                let start = epoch.div_euclid(self.window_secs) * self.window_secs;
                buckets.entry(start).or_default().push(row);
            }
        }

        let mut starts = Vec::with_capacity(buckets.len());
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(buckets.len()); numeric_cols.len()];

        for (start, rows) in &buckets {
            starts.push(epoch_value(*start));
            for (i, name) in numeric_cols.iter().enumerate() {
                let column = frame.column(name).unwrap();
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| column[*row].as_float())
                    .collect();
                columns[i].push(mean(&values).map(Value::Float).unwrap_or(Value::Null));
            }
        }

        let mut result = Frame::new();
        result.set_column("timestamp", starts);
        for (name, values) in numeric_cols.iter().zip(columns) {
            result.set_column(name, values);
        }

        log::info!(
            "⏱️ Time-window aggregation ({}s): {} windows",
            self.window_secs,
            result.num_rows()
        );
        result
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the device grouping key: `sensor_id` wins over `device_id`.
pub fn resolve_device_key(frame: &Frame) -> Option<&'static str> {
    if frame.has_column("sensor_id") {
        Some("sensor_id")
    } else if frame.has_column("device_id") {
        Some("device_id")
    } else {
        None
    }
}

/// Group rows by device and compute per-column statistics: mean/min/max/std
/// for numeric measurements, sum (event count) and mean (event rate) for
/// boolean events. Column names are flattened to `{field}_{stat}`.
fn aggregate_by_device(frame: &Frame) -> Frame {
    let Some(group_col) = resolve_device_key(frame) else {
        log::warn!("No device key column (sensor_id / device_id), skipping device aggregation");
        return Frame::new();
    };

    let numeric_cols: Vec<&str> = NUMERIC_CANDIDATES
        .iter()
        .copied()
        .filter(|c| frame.has_column(c))
        .collect();
    let bool_cols: Vec<&str> = BOOLEAN_CANDIDATES
        .iter()
        .copied()
        .filter(|c| frame.has_column(c))
        .collect();

    if numeric_cols.is_empty() && bool_cols.is_empty() {
        log::warn!("No aggregatable columns found in chunk");
        return Frame::new();
    }

    // BTreeMap keeps devices in sorted order; null keys are dropped
    let keys = frame.column(group_col).unwrap();
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (row, key) in keys.iter().enumerate() {
        if let Some(key) = group_key(key) {
            groups.entry(key).or_default().push(row);
        }
    }

    let mut devices = Vec::with_capacity(groups.len());
    let mut stat_names = Vec::new();
    for col in &numeric_cols {
        for stat in NUMERIC_STATS {
            stat_names.push(format!("{}_{}", col, stat));
        }
    }
    for col in &bool_cols {
        for stat in BOOLEAN_STATS {
            stat_names.push(format!("{}_{}", col, stat));
        }
    }
    let mut stat_columns: Vec<Vec<Value>> = vec![Vec::with_capacity(groups.len()); stat_names.len()];

    for (device, rows) in &groups {
        devices.push(Value::Str(device.clone()));
        let mut slot = 0;

        for col in &numeric_cols {
            let column = frame.column(col).unwrap();
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|row| column[*row].as_float())
                .collect();

            let stats = [
                mean(&values),
                values.iter().copied().reduce(f64::min),
                values.iter().copied().reduce(f64::max),
                std_dev(&values),
            ];
            for stat in stats {
                stat_columns[slot].push(stat.map(Value::Float).unwrap_or(Value::Null));
                slot += 1;
            }
        }

        for col in &bool_cols {
            let column = frame.column(col).unwrap();
            let flags: Vec<bool> = rows
                .iter()
                .filter_map(|row| match &column[*row] {
                    Value::Bool(b) => Some(*b),
                    Value::Float(f) => Some(*f != 0.0),
                    _ => None,
                })
                .collect();

            let count = flags.iter().filter(|b| **b).count() as f64;
            stat_columns[slot].push(Value::Float(count));
            slot += 1;
            let rate = if flags.is_empty() {
                Value::Null
            } else {
                Value::Float(count / flags.len() as f64)
            };
            stat_columns[slot].push(rate);
            slot += 1;
        }
    }

    let mut result = Frame::new();
    result.set_column(group_col, devices);
    for (name, values) in stat_names.iter().zip(stat_columns) {
        result.set_column(name, values);
    }

    log::info!(
        "📊 Aggregation completed: {} device(s), {} metric(s)",
        result.num_rows(),
        result.num_columns().saturating_sub(1)
    );
    result
}

fn group_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Str(s) => Some(s.clone()),
        Value::Float(f) => Some(f.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Time(t) => Some(t.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

fn timestamp_epoch(value: &Value) -> Option<i64> {
    match value {
        Value::Time(t) => Some(t.and_utc().timestamp()),
        Value::Str(s) => {
            let s = s.trim();
            parse_primary(s)
                .or_else(|| parse_flexible(s))
                .map(|t| t.and_utc().timestamp())
        }
        _ => None,
    }
}

fn epoch_value(epoch: i64) -> Value {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|dt| Value::Time(dt.naive_utc()))
        .unwrap_or(Value::Null)
}

/// A column is numeric when it holds at least one float and nothing but
/// floats and nulls.
fn is_numeric_column(column: &[Value]) -> bool {
    let mut saw_float = false;
    for value in column {
        match value {
            Value::Float(_) => saw_float = true,
            Value::Null => {}
            _ => return false,
        }
    }
    saw_float
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation; null for fewer than two observations.
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}
