//! Chunk validation against the declarative schema
//!
//! All checks run even when earlier ones fail; their errors accumulate so a
//! single quarantine block can name every problem in the chunk. Checks read
//! the frame without mutating it; the numeric coercion computed during
//! validation is applied only when the chunk passes.

use crate::config::PipelineConfig;
use crate::frame::{Frame, Value};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Columns produced by the numeric check: field name plus its coerced values
type CoercionReport = Vec<(String, Vec<Value>)>;

pub struct Validator<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Validate one chunk file.
    ///
    /// Returns `(Some(frame), [])` when the chunk passes (numeric fields
    /// already coerced), `(None, errors)` when it fails. A failing chunk is
    /// moved to the quarantine directory and logged; a chunk that cannot be
    /// parsed at all is reported but left in place.
    pub fn validate(&self, path: &Path) -> io::Result<(Option<Frame>, Vec<String>)> {
        let filename = chunk_name(path);
        log::info!("🔍 Validating chunk: {}", filename);

        let mut frame = match Frame::from_csv_path(path) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Could not read chunk {}: {}", filename, e);
                return Ok((None, vec![format!("Could not read file: {}", e)]));
            }
        };

        let mut errors = self.check_required_fields(&frame);
        let (coerced, numeric_errors) = self.check_numeric_fields(&frame);
        errors.extend(numeric_errors);
        errors.extend(self.check_boolean_fields(&frame));
        errors.extend(self.check_ranges(&frame, &coerced));

        if !errors.is_empty() {
            log::warn!("🚫 Chunk {} failed validation: {:?}", filename, errors);
            self.quarantine(path, &errors)?;
            return Ok((None, errors));
        }

        for (field, values) in coerced {
            frame.set_column(&field, values);
        }

        log::info!("✅ Chunk {} passed validation", filename);
        Ok((Some(frame), Vec::new()))
    }

    /// Required fields must be present and contain no nulls.
    fn check_required_fields(&self, frame: &Frame) -> Vec<String> {
        let mut errors = Vec::new();

        for field in &self.config.schema.required_fields {
            if !frame.has_column(field) {
                errors.push(format!("Column '{}' is missing", field));
                continue;
            }
            let null_count = frame.null_count(field);
            if null_count > 0 {
                errors.push(format!("Column '{}' has {} null values", field, null_count));
            }
        }

        errors
    }

    /// Coerce numeric columns and flag cells that could not be parsed.
    ///
    /// Only newly-null cells count as errors; cells that were already null
    /// before coercion contribute nothing.
    fn check_numeric_fields(&self, frame: &Frame) -> (CoercionReport, Vec<String>) {
        let mut report = Vec::new();
        let mut errors = Vec::new();

        for field in &self.config.schema.numeric_fields {
            let Some(column) = frame.column(field) else {
                continue;
            };

            let before_nulls = column.iter().filter(|v| v.is_null()).count();
            let coerced: Vec<Value> = column.iter().map(Value::coerce_numeric).collect();
            let after_nulls = coerced.iter().filter(|v| v.is_null()).count();

            let new_non_numeric = after_nulls - before_nulls;
            if new_non_numeric > 0 {
                errors.push(format!(
                    "Column '{}' has {} non-numeric values",
                    field, new_non_numeric
                ));
            }

            report.push((field.clone(), coerced));
        }

        (report, errors)
    }

    /// Boolean columns may only contain {true, false, 0, 1}.
    fn check_boolean_fields(&self, frame: &Frame) -> Vec<String> {
        let mut errors = Vec::new();

        for field in &self.config.schema.boolean_fields {
            let Some(column) = frame.column(field) else {
                continue;
            };

            let invalid = column.iter().filter(|v| !is_boolean_literal(v)).count();
            if invalid > 0 {
                errors.push(format!(
                    "Column '{}' has {} non-boolean values",
                    field, invalid
                ));
            }
        }

        errors
    }

    /// Range checks on the temperature and humidity fields, over the
    /// post-coercion values. Boundary values are valid; nulls are skipped.
    fn check_ranges(&self, frame: &Frame, coerced: &CoercionReport) -> Vec<String> {
        let schema = &self.config.schema;
        let checks = [
            (
                &schema.temperature_field,
                schema.temperature_min,
                schema.temperature_max,
            ),
            (&schema.humidity_field, schema.humidity_min, schema.humidity_max),
        ];

        let mut errors = Vec::new();

        for (field, min, max) in checks {
            let Some(column) = effective_column(frame, coerced, field) else {
                continue;
            };

            let out_of_range = column
                .iter()
                .filter_map(Value::as_float)
                .filter(|v| *v < min || *v > max)
                .count();

            if out_of_range > 0 {
                errors.push(format!(
                    "Column '{}' has {} values outside range [{}, {}]",
                    field, out_of_range, min, max
                ));
            }
        }

        errors
    }

    /// Move the chunk into the quarantine directory and record the reasons.
    fn quarantine(&self, path: &Path, errors: &[String]) -> io::Result<()> {
        let filename = chunk_name(path);

        std::fs::create_dir_all(&self.config.quarantine_dir)?;
        let quarantine_path = self.config.quarantine_dir.join(&filename);
        std::fs::rename(path, &quarantine_path)?;

        append_quarantine_log(&self.config.logs_dir, &filename, errors)?;

        log::warn!("🗂️ Chunk quarantined: {}", filename);
        Ok(())
    }
}

/// Append one reason block to `<logs_dir>/quarantine.log`.
pub fn append_quarantine_log(logs_dir: &Path, filename: &str, reasons: &[String]) -> io::Result<()> {
    std::fs::create_dir_all(logs_dir)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join("quarantine.log"))?;

    writeln!(file, "\n{}", "=".repeat(50))?;
    writeln!(file, "File: {}", filename)?;
    writeln!(file, "Reasons:")?;
    for reason in reasons {
        writeln!(file, "  - {}", reason)?;
    }

    Ok(())
}

pub(crate) fn chunk_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_boolean_literal(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Float(f) => *f == 0.0 || *f == 1.0,
        Value::Str(s) => {
            let s = s.trim();
            s == "0" || s == "1" || s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
        }
        Value::Null | Value::Time(_) => false,
    }
}

/// Prefer the coerced view of a column when the numeric check produced one.
fn effective_column<'f>(
    frame: &'f Frame,
    coerced: &'f CoercionReport,
    field: &str,
) -> Option<&'f [Value]> {
    coerced
        .iter()
        .find(|(name, _)| name == field)
        .map(|(_, values)| values.as_slice())
        .or_else(|| frame.column(field))
}
