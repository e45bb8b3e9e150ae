//! JSONL writer for aggregate reports - one file per aggregation view

use super::writer_backend::{ChunkReport, ReportWriterBackend, ReportWriterError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportView {
    ByDevice,
    ByTimeWindow,
}

impl ReportView {
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportView::ByDevice => "by_device.jsonl",
            ReportView::ByTimeWindow => "by_time_window.jsonl",
        }
    }

    pub fn all() -> [ReportView; 2] {
        [ReportView::ByDevice, ReportView::ByTimeWindow]
    }
}

pub struct JsonlReportWriter {
    writers: HashMap<ReportView, BufWriter<std::fs::File>>,
    last_flush: Instant,
}

impl JsonlReportWriter {
    pub fn new(base_path: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base_path)?;

        let mut writers = HashMap::new();
        for view in ReportView::all() {
            let file_path = base_path.join(view.file_name());

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)?;

            log::info!("📝 Writing aggregate reports to: {}", file_path.display());
            writers.insert(view, BufWriter::new(file));
        }

        Ok(Self {
            writers,
            last_flush: Instant::now(),
        })
    }

    pub fn write_report(&mut self, report: &ChunkReport) -> Result<(), ReportWriterError> {
        self.write_rows(ReportView::ByDevice, report, &report.by_device)?;
        self.write_rows(ReportView::ByTimeWindow, report, &report.by_time_window)?;

        // Flush every 5 seconds
        if self.last_flush.elapsed() > Duration::from_secs(5) {
            self.flush()?;
            self.last_flush = Instant::now();
        }

        Ok(())
    }

    fn write_rows(
        &mut self,
        view: ReportView,
        report: &ChunkReport,
        rows: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<(), ReportWriterError> {
        let writer = self.writers.get_mut(&view).ok_or_else(|| {
            ReportWriterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Writer not found",
            ))
        })?;

        for row in rows {
            let mut obj = serde_json::Map::new();
            obj.insert("chunk".to_string(), report.chunk.clone().into());
            obj.insert("generated_at".to_string(), report.generated_at.into());
            obj.extend(row.clone());

            let json = serde_json::to_string(&serde_json::Value::Object(obj))?;
            writeln!(writer, "{}", json)?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for JsonlReportWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[async_trait]
impl ReportWriterBackend for JsonlReportWriter {
    async fn write_report(&mut self, report: &ChunkReport) -> Result<(), ReportWriterError> {
        self.write_report(report)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregationResult;
    use crate::frame::{Frame, Value};

    fn test_report() -> ChunkReport {
        let result = AggregationResult {
            by_device: Frame::from_columns(vec![
                ("sensor_id", vec![Value::Str("SENSOR_001".to_string())]),
                ("temperature_mean", vec![Value::Float(22.5)]),
            ]),
            by_time_window: Frame::from_columns(vec![(
                "temperature",
                vec![Value::Float(22.5), Value::Float(23.0)],
            )]),
        };
        ChunkReport::new("chunk_0001.csv".to_string(), 1700000000, &result)
    }

    #[test]
    fn test_rows_written_per_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonlReportWriter::new(dir.path().to_path_buf()).unwrap();

        writer.write_report(&test_report()).unwrap();
        writer.flush().unwrap();

        let device_lines = std::fs::read_to_string(dir.path().join("by_device.jsonl")).unwrap();
        let device_rows: Vec<&str> = device_lines.lines().collect();
        assert_eq!(device_rows.len(), 1);

        let row: serde_json::Value = serde_json::from_str(device_rows[0]).unwrap();
        assert_eq!(row["chunk"], "chunk_0001.csv");
        assert_eq!(row["generated_at"], 1700000000);
        assert_eq!(row["sensor_id"], "SENSOR_001");
        assert_eq!(row["temperature_mean"], 22.5);

        let window_lines =
            std::fs::read_to_string(dir.path().join("by_time_window.jsonl")).unwrap();
        assert_eq!(window_lines.lines().count(), 2);
    }

    #[test]
    fn test_reports_append_across_writers() {
        let dir = tempfile::tempdir().unwrap();

        for _ in 0..2 {
            let mut writer = JsonlReportWriter::new(dir.path().to_path_buf()).unwrap();
            writer.write_report(&test_report()).unwrap();
            writer.flush().unwrap();
        }

        let device_lines = std::fs::read_to_string(dir.path().join("by_device.jsonl")).unwrap();
        assert_eq!(device_lines.lines().count(), 2);
    }
}
