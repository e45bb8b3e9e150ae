//! IotFlow - Sensor Chunk Ingestion Pipeline
//!
//! Watches a drop directory for CSV sensor chunks and runs each one through:
//!
//! ```text
//! FileMonitor → Validator → Processor → Aggregator
//!     ↓ (invalid chunks)
//! quarantine/ + quarantine.log
//!     ↓ (aggregated views)
//! ReportWriter → JSONL or SQLite backend
//! ```

pub mod aggregator;
pub mod config;
pub mod frame;
pub mod intake;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod validator;

pub use aggregator::{AggregationResult, Aggregator};
pub use config::{PipelineConfig, ReportBackend, SchemaConfig};
pub use frame::{Frame, Value};
pub use intake::{ChunkHandler, FileMonitor};
pub use pipeline::{ChunkPipeline, PipelineError};
pub use processor::Processor;
pub use report::ReportWriter;
pub use validator::Validator;
