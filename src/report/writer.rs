//! Unified writer interface for aggregate reports
//!
//! Routes writes to either the JSONL or SQLite backend based on
//! configuration.

use super::jsonl_writer::JsonlReportWriter;
use super::sqlite_writer::SqliteReportWriter;
use super::writer_backend::{ChunkReport, ReportWriterError};
use crate::config::ReportBackend;
use std::path::PathBuf;

/// Unified writer that routes to either JSONL or SQLite backend
pub enum ReportWriter {
    Jsonl(JsonlReportWriter),
    Sqlite(SqliteReportWriter),
}

impl ReportWriter {
    /// Create a new report writer based on backend type
    pub fn new(backend: ReportBackend, base_path: PathBuf) -> Result<Self, ReportWriterError> {
        match backend {
            ReportBackend::Jsonl => {
                let writer = JsonlReportWriter::new(base_path)?;
                Ok(ReportWriter::Jsonl(writer))
            }
            ReportBackend::Sqlite => {
                let writer = SqliteReportWriter::new(base_path)?;
                Ok(ReportWriter::Sqlite(writer))
            }
        }
    }

    /// Write both aggregation views of one chunk
    pub async fn write_report(&mut self, report: &ChunkReport) -> Result<(), ReportWriterError> {
        use super::writer_backend::ReportWriterBackend;
        match self {
            ReportWriter::Jsonl(w) => ReportWriterBackend::write_report(w, report).await,
            ReportWriter::Sqlite(w) => ReportWriterBackend::write_report(w, report).await,
        }
    }

    /// Flush pending writes to storage
    pub async fn flush(&mut self) -> Result<(), ReportWriterError> {
        use super::writer_backend::ReportWriterBackend;
        match self {
            ReportWriter::Jsonl(w) => ReportWriterBackend::flush(w).await,
            ReportWriter::Sqlite(w) => ReportWriterBackend::flush(w).await,
        }
    }

    /// Get backend type for logging
    pub fn backend_type(&self) -> &'static str {
        match self {
            ReportWriter::Jsonl(_) => "JSONL",
            ReportWriter::Sqlite(_) => "SQLite",
        }
    }
}
