//! Full processing pipeline for a single incoming chunk
//!
//! The monitor invokes `ChunkPipeline` per discovered file:
//! validate → process → aggregate → persist the aggregation views.

use crate::aggregator::Aggregator;
use crate::config::PipelineConfig;
use crate::intake::ChunkHandler;
use crate::processor::Processor;
use crate::report::{ChunkReport, ReportWriter, ReportWriterError};
use crate::validator::{chunk_name, Validator};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;

#[derive(Debug)]
pub enum PipelineError {
    Io(std::io::Error),
    Report(ReportWriterError),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl From<ReportWriterError> for PipelineError {
    fn from(err: ReportWriterError) -> Self {
        PipelineError::Report(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Io(e) => write!(f, "IO error: {}", e),
            PipelineError::Report(e) => write!(f, "Report error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

pub struct ChunkPipeline {
    config: PipelineConfig,
    aggregator: Aggregator,
    writer: ReportWriter,
}

impl ChunkPipeline {
    pub fn new(config: PipelineConfig, writer: ReportWriter) -> Self {
        Self {
            config,
            aggregator: Aggregator::new(),
            writer,
        }
    }
}

#[async_trait]
impl ChunkHandler for ChunkPipeline {
    async fn handle(&mut self, path: &Path) -> Result<(), PipelineError> {
        let filename = chunk_name(path);

        // 1. Validate - quarantines the chunk and returns (None, errors) if invalid
        let (frame, errors) = Validator::new(&self.config).validate(path)?;
        let Some(frame) = frame else {
            log::warn!("⏭️ Skipping invalid chunk {}: {:?}", filename, errors);
            return Ok(());
        };

        // 2. Process - parse timestamps, coerce types, rename columns
        let frame = Processor::new(&self.config.schema).process(frame);

        // 3. Aggregate - per-device stats + time-window resampling
        let result = self.aggregator.aggregate(&frame);

        // 4. Persist both views
        let report = ChunkReport::new(filename.clone(), Utc::now().timestamp(), &result);
        self.writer.write_report(&report).await?;

        log::info!(
            "✅ Chunk fully processed: {} ({} devices, {} windows)",
            filename,
            result.by_device.num_rows(),
            result.by_time_window.num_rows()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, ReportBackend, RetryConfig, SchemaConfig};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.path().join("data"),
            quarantine_dir: dir.path().join("quarantine"),
            logs_dir: dir.path().join("logs"),
            chunk_size: 100,
            poll_interval_secs: 1,
            report_backend: ReportBackend::Jsonl,
            report_path: dir.path().join("reports"),
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_secs: 0,
                max_backoff_secs: 1,
            },
            schema: SchemaConfig {
                required_fields: vec!["sensor_id".to_string(), "timestamp".to_string()],
                numeric_fields: vec!["temp".to_string(), "humidity".to_string()],
                boolean_fields: vec!["motion".to_string()],
                temperature_field: "temp".to_string(),
                temperature_min: -20.0,
                temperature_max: 50.0,
                humidity_field: "humidity".to_string(),
                humidity_min: 0.0,
                humidity_max: 100.0,
            },
        }
    }

    fn write_chunk(config: &PipelineConfig, name: &str, content: &str) -> PathBuf {
        std::fs::create_dir_all(&config.data_dir).unwrap();
        let path = config.data_dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn test_pipeline(config: &PipelineConfig) -> ChunkPipeline {
        let writer =
            ReportWriter::new(config.report_backend, config.report_path.clone()).unwrap();
        ChunkPipeline::new(config.clone(), writer)
    }

    #[tokio::test]
    async fn test_valid_chunk_flows_to_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let path = write_chunk(
            &config,
            "chunk_0001.csv",
            "sensor_id,timestamp,temp,humidity,motion\n\
             SENSOR_001,2024-06-01 12:00:00,22.5,45.0,1\n\
             SENSOR_001,2024-06-01 12:00:30,23.5,46.0,0\n\
             SENSOR_002,2024-06-01 12:01:00,21.0,44.0,1\n",
        );

        let mut pipeline = test_pipeline(&config);
        pipeline.handle(&path).await.unwrap();
        pipeline.writer.flush().await.unwrap();

        let device_lines =
            std::fs::read_to_string(config.report_path.join("by_device.jsonl")).unwrap();
        let rows: Vec<serde_json::Value> = device_lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["sensor_id"], "SENSOR_001");
        assert_eq!(rows[0]["temperature_mean"], 23.0);
        assert_eq!(rows[0]["motion_detected_sum"], 1.0);
        assert_eq!(rows[1]["sensor_id"], "SENSOR_002");

        let window_lines =
            std::fs::read_to_string(config.report_path.join("by_time_window.jsonl")).unwrap();
        // 12:00 and 12:01 buckets
        assert_eq!(window_lines.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_chunk_is_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let path = write_chunk(
            &config,
            "chunk_0001.csv",
            "sensor_id,timestamp,temp,humidity,motion\n,2024-06-01 12:00:00,22.5,45.0,1\n",
        );

        let mut pipeline = test_pipeline(&config);
        // invalid chunks are quarantined, not handler failures
        pipeline.handle(&path).await.unwrap();

        assert!(config.quarantine_dir.join("chunk_0001.csv").exists());
        pipeline.writer.flush().await.unwrap();
        let device_lines =
            std::fs::read_to_string(config.report_path.join("by_device.jsonl")).unwrap();
        assert!(device_lines.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_chunk_is_skipped_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let path = write_chunk(&config, "ragged.csv", "a,b\n1,2\n3\n");

        let mut pipeline = test_pipeline(&config);
        pipeline.handle(&path).await.unwrap();

        assert!(path.exists());
        assert!(!config.quarantine_dir.join("ragged.csv").exists());
    }
}
