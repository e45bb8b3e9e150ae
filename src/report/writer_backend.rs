//! Writer backend trait for aggregate reports
//!
//! Defines the interface for persisting per-chunk aggregation views to
//! different backends.

use crate::aggregator::AggregationResult;
use async_trait::async_trait;
use serde::Serialize;

/// The aggregation views of one chunk, flattened to JSON rows
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub chunk: String,
    pub generated_at: i64,
    pub by_device: Vec<serde_json::Map<String, serde_json::Value>>,
    pub by_time_window: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ChunkReport {
    pub fn new(chunk: String, generated_at: i64, result: &AggregationResult) -> Self {
        Self {
            chunk,
            generated_at,
            by_device: result.by_device.to_json_rows(),
            by_time_window: result.by_time_window.to_json_rows(),
        }
    }
}

#[derive(Debug)]
pub enum ReportWriterError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<std::io::Error> for ReportWriterError {
    fn from(err: std::io::Error) -> Self {
        ReportWriterError::Io(err)
    }
}

impl From<serde_json::Error> for ReportWriterError {
    fn from(err: serde_json::Error) -> Self {
        ReportWriterError::Serialization(err)
    }
}

impl From<rusqlite::Error> for ReportWriterError {
    fn from(err: rusqlite::Error) -> Self {
        ReportWriterError::Database(err.to_string())
    }
}

impl std::fmt::Display for ReportWriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportWriterError::Io(e) => write!(f, "IO error: {}", e),
            ReportWriterError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ReportWriterError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ReportWriterError {}

/// Backend trait for writing aggregate reports
#[async_trait]
pub trait ReportWriterBackend: Send {
    /// Write both aggregation views of one chunk
    async fn write_report(&mut self, report: &ChunkReport) -> Result<(), ReportWriterError>;

    /// Flush pending writes to storage
    async fn flush(&mut self) -> Result<(), ReportWriterError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
