//! Aggregate report persistence
//!
//! Every chunk that survives validation produces two aggregation views; the
//! report writers record them so downstream consumers do not have to scrape
//! the pipeline log.
//!
//! # Architecture
//!
//! ```text
//! AggregationResult → ChunkReport
//!     ↓
//! ReportWriter → JSONL (by_device.jsonl / by_time_window.jsonl)
//!             → SQLite (device_aggregates / window_aggregates)
//! ```

pub mod jsonl_writer;
pub mod sqlite_writer;
pub mod writer;
pub mod writer_backend;

pub use jsonl_writer::JsonlReportWriter;
pub use sqlite_writer::SqliteReportWriter;
pub use writer::ReportWriter;
pub use writer_backend::{ChunkReport, ReportWriterBackend, ReportWriterError};
