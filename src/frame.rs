//! Column-major table for CSV sensor chunks

use chrono::NaiveDateTime;
use std::path::Path;

/// Cell tokens treated as null when loading a chunk
const NA_TOKENS: &[&str] = &["", "NA", "NULL", "NaN", "nan", "null"];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Float(f64),
    Bool(bool),
    Str(String),
    Time(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Lossy numeric coercion: unparseable values become null
    pub fn coerce_numeric(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Float(f) => Value::Float(*f),
            Value::Bool(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Null),
            Value::Time(_) => Value::Null,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Time(t) => {
                serde_json::Value::String(t.format("%Y-%m-%d %H:%M:%S").to_string())
            }
        }
    }
}

#[derive(Debug)]
pub enum FrameError {
    Io(std::io::Error),
    Csv(csv::Error),
    EmptyChunk,
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err)
    }
}

impl From<csv::Error> for FrameError {
    fn from(err: csv::Error) -> Self {
        FrameError::Csv(err)
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "IO error: {}", e),
            FrameError::Csv(e) => write!(f, "CSV error: {}", e),
            FrameError::EmptyChunk => write!(f, "chunk contains no header row"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Column-major table. All columns have the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from (name, column) pairs. Columns must be equal length.
    pub fn from_columns(pairs: Vec<(&str, Vec<Value>)>) -> Self {
        let mut names = Vec::with_capacity(pairs.len());
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(pairs.len());
        for (name, values) in pairs {
            if let Some(first) = columns.first() {
                assert_eq!(first.len(), values.len(), "ragged column '{}'", name);
            }
            names.push(name.to_string());
            columns.push(values);
        }
        Self { names, columns }
    }

    /// Load a CSV chunk. The first row is the header; empty cells and common
    /// NA tokens become null. Ragged rows are a `FrameError`.
    pub fn from_csv_path(path: &Path) -> Result<Self, FrameError> {
        let mut reader = csv::ReaderBuilder::new().from_path(path)?;

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(FrameError::EmptyChunk);
        }

        let names: Vec<String> = headers.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

        for record in reader.records() {
            let record = record?;
            for (i, cell) in record.iter().enumerate() {
                columns[i].push(parse_cell(cell));
            }
        }

        Ok(Self { names, columns })
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.columns[idx])
    }

    /// Replace an existing column, or append a new one.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => self.columns[idx] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
    }

    /// Rename a column if present; no-op otherwise.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.names.iter().position(|n| n == from) {
            self.names[idx] = to.to_string();
        }
    }

    pub fn null_count(&self, name: &str) -> usize {
        self.column(name)
            .map(|col| col.iter().filter(|v| v.is_null()).count())
            .unwrap_or(0)
    }

    /// Export rows as JSON objects, in column order.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.num_rows())
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (name, col) in self.names.iter().zip(&self.columns) {
                    obj.insert(name.clone(), col[row].to_json());
                }
                obj
            })
            .collect()
    }
}

fn parse_cell(cell: &str) -> Value {
    if NA_TOKENS.contains(&cell) {
        Value::Null
    } else {
        Value::Str(cell.to_string())
    }
}
