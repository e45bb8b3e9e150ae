//! SQLite writer for aggregate reports
//!
//! One row per device / per time window, with the metric columns stored as a
//! JSON payload so the schema survives deployment-specific column sets.

use super::writer_backend::{ChunkReport, ReportWriterBackend, ReportWriterError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct SqliteReportWriter {
    conn: Connection,
}

impl SqliteReportWriter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, ReportWriterError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS device_aggregates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk TEXT NOT NULL,
                device TEXT NOT NULL,
                metrics TEXT NOT NULL,
                generated_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS window_aggregates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk TEXT NOT NULL,
                window_start TEXT NOT NULL,
                metrics TEXT NOT NULL,
                generated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_device_chunk ON device_aggregates(chunk)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_window_chunk ON window_aggregates(chunk)",
            [],
        )?;

        log::info!("✅ SQLite report writer initialized");

        Ok(Self { conn })
    }

    fn write_report(&mut self, report: &ChunkReport) -> Result<(), ReportWriterError> {
        let tx = self.conn.transaction()?;

        for row in &report.by_device {
            let device = row
                .get("sensor_id")
                .or_else(|| row.get("device_id"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let metrics = serde_json::to_string(&serde_json::Value::Object(row.clone()))?;

            tx.execute(
                "INSERT INTO device_aggregates (chunk, device, metrics, generated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![report.chunk, device, metrics, report.generated_at],
            )?;
        }

        for row in &report.by_time_window {
            let window_start = row
                .get("timestamp")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let metrics = serde_json::to_string(&serde_json::Value::Object(row.clone()))?;

            tx.execute(
                "INSERT INTO window_aggregates (chunk, window_start, metrics, generated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![report.chunk, window_start, metrics, report.generated_at],
            )?;
        }

        tx.commit()?;

        log::debug!(
            "✅ Aggregate report written: {} ({} devices, {} windows)",
            report.chunk,
            report.by_device.len(),
            report.by_time_window.len()
        );

        Ok(())
    }
}

#[async_trait]
impl ReportWriterBackend for SqliteReportWriter {
    async fn write_report(&mut self, report: &ChunkReport) -> Result<(), ReportWriterError> {
        SqliteReportWriter::write_report(self, report)
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        // writes are committed per report
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregationResult;
    use crate::frame::{Frame, Value};
    use chrono::NaiveDate;

    fn test_report() -> ChunkReport {
        let window_start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let result = AggregationResult {
            by_device: Frame::from_columns(vec![
                ("sensor_id", vec![Value::Str("SENSOR_001".to_string())]),
                ("temperature_mean", vec![Value::Float(22.5)]),
            ]),
            by_time_window: Frame::from_columns(vec![
                ("timestamp", vec![Value::Time(window_start)]),
                ("temperature", vec![Value::Float(22.5)]),
            ]),
        };
        ChunkReport::new("chunk_0001.csv".to_string(), 1700000000, &result)
    }

    #[tokio::test]
    async fn test_sqlite_report_write() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("aggregates.db");
        let mut writer = SqliteReportWriter::new(&db_path).unwrap();

        ReportWriterBackend::write_report(&mut writer, &test_report())
            .await
            .unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let (device, metrics): (String, String) = conn
            .query_row(
                "SELECT device, metrics FROM device_aggregates WHERE chunk = ?1",
                params!["chunk_0001.csv"],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        assert_eq!(device, "SENSOR_001");
        let parsed: serde_json::Value = serde_json::from_str(&metrics).unwrap();
        assert_eq!(parsed["temperature_mean"], 22.5);

        let window_start: String = conn
            .query_row(
                "SELECT window_start FROM window_aggregates WHERE chunk = ?1",
                params!["chunk_0001.csv"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(window_start, "2024-06-01 12:00:00");
    }

    #[tokio::test]
    async fn test_multiple_reports_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("aggregates.db");
        let mut writer = SqliteReportWriter::new(&db_path).unwrap();

        for _ in 0..3 {
            ReportWriterBackend::write_report(&mut writer, &test_report())
                .await
                .unwrap();
        }

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM device_aggregates", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 3);
    }
}
