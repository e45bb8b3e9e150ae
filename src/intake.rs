//! Directory polling monitor
//!
//! Discovers new CSV chunks in the watched directory, invokes the handler
//! for each in filename-sorted order, and tracks which files are done. A
//! failing chunk is retried with exponential backoff; after the attempt
//! budget is spent it is dead-lettered into the quarantine directory so no
//! file is ever silently dropped.

use crate::config::PipelineConfig;
use crate::pipeline::PipelineError;
use crate::validator::append_quarantine_log;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const CHUNK_EXTENSION: &str = "csv";

/// Per-file processing boundary invoked by the monitor.
///
/// Returning `Ok` marks the file processed for the lifetime of the run;
/// returning `Err` schedules a retry.
#[async_trait]
pub trait ChunkHandler: Send {
    async fn handle(&mut self, path: &Path) -> Result<(), PipelineError>;
}

/// Exponential backoff schedule for failing chunks
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial_delay_secs: u64,
    max_delay_secs: u64,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(initial_delay_secs: u64, max_delay_secs: u64, max_attempts: u32) -> Self {
        Self {
            initial_delay_secs,
            max_delay_secs,
            max_attempts,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let secs = self
            .initial_delay_secs
            .saturating_mul(2u64.saturating_pow(exp))
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }
}

struct FileAttempt {
    count: u32,
    next_eligible: Instant,
}

pub struct FileMonitor {
    data_dir: PathBuf,
    quarantine_dir: PathBuf,
    logs_dir: PathBuf,
    poll_interval: Duration,
    retry: RetryPolicy,
    processed: HashSet<String>,
    attempts: HashMap<String, FileAttempt>,
}

impl FileMonitor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            quarantine_dir: config.quarantine_dir.clone(),
            logs_dir: config.logs_dir.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            retry: RetryPolicy::new(
                config.retry.initial_backoff_secs,
                config.retry.max_backoff_secs,
                config.retry.max_attempts,
            ),
            processed: HashSet::new(),
            attempts: HashMap::new(),
        }
    }

    /// Poll the watched directory forever. Termination is external.
    pub async fn run(&mut self, handler: &mut dyn ChunkHandler) {
        log::info!(
            "🚀 Pipeline started. Monitoring folder: {}",
            self.data_dir.display()
        );

        loop {
            if let Err(e) = self.poll_once(handler).await {
                log::error!("Failed to list data directory: {}", e);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// One poll cycle: discover, sort, handle each new chunk in order.
    pub async fn poll_once(&mut self, handler: &mut dyn ChunkHandler) -> io::Result<()> {
        for filename in self.discover()? {
            if let Some(attempt) = self.attempts.get(&filename) {
                if Instant::now() < attempt.next_eligible {
                    continue;
                }
            }

            let path = self.data_dir.join(&filename);
            log::info!("📥 New chunk detected: {}", filename);

            match handler.handle(&path).await {
                Ok(()) => {
                    self.processed.insert(filename.clone());
                    self.attempts.remove(&filename);
                }
                Err(e) => {
                    log::error!("Failed to process {}: {}", filename, e);
                    self.record_failure(filename, &path, &e);
                }
            }
        }

        Ok(())
    }

    /// New chunk filenames: expected extension, not yet processed, sorted.
    fn discover(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXTENSION) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.processed.contains(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    fn record_failure(&mut self, filename: String, path: &Path, error: &PipelineError) {
        let count = {
            let entry = self.attempts.entry(filename.clone()).or_insert(FileAttempt {
                count: 0,
                next_eligible: Instant::now(),
            });
            entry.count += 1;
            entry.count
        };

        if count >= self.retry.max_attempts {
            self.attempts.remove(&filename);
            self.dead_letter(&filename, path, count, error);
            self.processed.insert(filename);
        } else {
            let delay = self.retry.delay_for(count);
            if let Some(entry) = self.attempts.get_mut(&filename) {
                entry.next_eligible = Instant::now() + delay;
            }
            log::warn!(
                "⏳ Retry attempt {} of {} for {} in {}s",
                count,
                self.retry.max_attempts,
                filename,
                delay.as_secs()
            );
        }
    }

    /// The attempt budget is spent: move the chunk to quarantine with a log
    /// entry. The file is preserved, never deleted.
    fn dead_letter(&self, filename: &str, path: &Path, attempts: u32, error: &PipelineError) {
        log::warn!(
            "🚫 Chunk {} exhausted {} attempts, moving to quarantine",
            filename,
            attempts
        );

        let reason = format!("Exhausted {} processing attempts: {}", attempts, error);
        let moved = std::fs::create_dir_all(&self.quarantine_dir)
            .and_then(|_| std::fs::rename(path, self.quarantine_dir.join(filename)))
            .and_then(|_| append_quarantine_log(&self.logs_dir, filename, &[reason]));

        if let Err(e) = moved {
            log::error!("Failed to dead-letter {}: {}", filename, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, ReportBackend, RetryConfig, SchemaConfig};
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, max_attempts: u32) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.path().join("data"),
            quarantine_dir: dir.path().join("quarantine"),
            logs_dir: dir.path().join("logs"),
            chunk_size: 100,
            poll_interval_secs: 1,
            report_backend: ReportBackend::Jsonl,
            report_path: dir.path().join("reports"),
            retry: RetryConfig {
                max_attempts,
                initial_backoff_secs: 0,
                max_backoff_secs: 1,
            },
            schema: SchemaConfig {
                required_fields: vec!["sensor_id".to_string()],
                numeric_fields: vec![],
                boolean_fields: vec![],
                temperature_field: "temp".to_string(),
                temperature_min: -20.0,
                temperature_max: 50.0,
                humidity_field: "humidity".to_string(),
                humidity_min: 0.0,
                humidity_max: 100.0,
            },
        }
    }

    fn drop_file(config: &PipelineConfig, name: &str) {
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::write(config.data_dir.join(name), "sensor_id\nA\n").unwrap();
    }

    struct RecordingHandler {
        calls: Vec<String>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(fail: bool) -> Self {
            Self {
                calls: Vec::new(),
                fail,
            }
        }
    }

    #[async_trait]
    impl ChunkHandler for RecordingHandler {
        async fn handle(&mut self, path: &Path) -> Result<(), PipelineError> {
            self.calls
                .push(path.file_name().unwrap().to_string_lossy().into_owned());
            if self.fail {
                Err(PipelineError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "boom",
                )))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_chunks_handled_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 3);
        drop_file(&config, "chunk_0002.csv");
        drop_file(&config, "chunk_0001.csv");
        std::fs::write(config.data_dir.join("notes.txt"), "ignored").unwrap();

        let mut monitor = FileMonitor::new(&config);
        let mut handler = RecordingHandler::new(false);
        monitor.poll_once(&mut handler).await.unwrap();

        assert_eq!(handler.calls, vec!["chunk_0001.csv", "chunk_0002.csv"]);
    }

    #[tokio::test]
    async fn test_processed_chunks_are_not_revisited() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 3);
        drop_file(&config, "chunk_0001.csv");

        let mut monitor = FileMonitor::new(&config);
        let mut handler = RecordingHandler::new(false);
        monitor.poll_once(&mut handler).await.unwrap();
        monitor.poll_once(&mut handler).await.unwrap();

        assert_eq!(handler.calls.len(), 1);

        // a new drop is still picked up
        drop_file(&config, "chunk_0002.csv");
        monitor.poll_once(&mut handler).await.unwrap();
        assert_eq!(handler.calls.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_chunk_is_retried_then_dead_lettered() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir, 2);
        drop_file(&config, "chunk_0001.csv");

        let mut monitor = FileMonitor::new(&config);
        let mut handler = RecordingHandler::new(true);

        // attempt 1: failure, scheduled for retry
        monitor.poll_once(&mut handler).await.unwrap();
        assert_eq!(handler.calls.len(), 1);
        assert!(config.data_dir.join("chunk_0001.csv").exists());

        // attempt 2: budget spent, dead-lettered into quarantine
        monitor.poll_once(&mut handler).await.unwrap();
        assert_eq!(handler.calls.len(), 2);
        assert!(!config.data_dir.join("chunk_0001.csv").exists());
        assert!(config.quarantine_dir.join("chunk_0001.csv").exists());

        let log = std::fs::read_to_string(config.logs_dir.join("quarantine.log")).unwrap();
        assert!(log.contains("File: chunk_0001.csv"));
        assert!(log.contains("Exhausted 2 processing attempts"));

        // no further attempts
        monitor.poll_once(&mut handler).await.unwrap();
        assert_eq!(handler.calls.len(), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(2, 10, 5);

        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
    }
}
