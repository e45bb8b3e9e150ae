//! Pipeline configuration from environment variables
//!
//! One immutable `PipelineConfig` is built at process entry and passed into
//! each component constructor; no component reads ambient state afterwards.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportBackend {
    Jsonl,
    Sqlite,
}

impl ReportBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportBackend::Jsonl => "JSONL",
            ReportBackend::Sqlite => "SQLite",
        }
    }
}

/// Declarative validation schema for incoming chunks
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub required_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub boolean_fields: Vec<String>,
    pub temperature_field: String,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_field: String,
    pub humidity_min: f64,
    pub humidity_max: f64,
}

/// Bounded-retry policy for chunks whose handler keeps failing
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Producer-side batching hint; not consumed by the pipeline itself
    pub chunk_size: usize,
    pub poll_interval_secs: u64,
    pub report_backend: ReportBackend,
    /// Reports directory for JSONL, database file for SQLite
    pub report_path: PathBuf,
    pub retry: RetryConfig,
    pub schema: SchemaConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DATA_DIR` (default: data)
    /// - `QUARANTINE_DIR` (default: quarantine)
    /// - `LOGS_DIR` (default: logs)
    /// - `CHUNK_SIZE` (default: 100)
    /// - `POLL_INTERVAL_SECS` (default: 5)
    /// - `REPORT_BACKEND` (jsonl | sqlite, default: jsonl)
    /// - `REPORTS_OUTPUT_PATH` (default: reports) - used when backend is jsonl
    /// - `IOTFLOW_DB_PATH` (default: data/aggregates.db) - used when backend is sqlite
    /// - `MAX_ATTEMPTS` (default: 5)
    /// - `INITIAL_BACKOFF_SECS` (default: 2)
    /// - `MAX_BACKOFF_SECS` (default: 60)
    /// - `REQUIRED_FIELDS` (default: sensor_id,timestamp)
    /// - `NUMERIC_FIELDS` (default: temp,humidity,co,lpg,smoke)
    /// - `BOOLEAN_FIELDS` (default: light,motion)
    /// - `TEMPERATURE_FIELD` / `TEMPERATURE_MIN` / `TEMPERATURE_MAX` (default: temp / -20 / 50)
    /// - `HUMIDITY_FIELD` / `HUMIDITY_MIN` / `HUMIDITY_MAX` (default: humidity / 0 / 100)
    pub fn from_env() -> Self {
        let report_backend = match env::var("REPORT_BACKEND")
            .unwrap_or_else(|_| "jsonl".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => ReportBackend::Sqlite,
            "jsonl" => ReportBackend::Jsonl,
            other => {
                log::warn!("Invalid REPORT_BACKEND '{}', defaulting to jsonl", other);
                ReportBackend::Jsonl
            }
        };

        let report_path = match report_backend {
            ReportBackend::Sqlite => env::var("IOTFLOW_DB_PATH")
                .unwrap_or_else(|_| "data/aggregates.db".to_string()),
            ReportBackend::Jsonl => {
                env::var("REPORTS_OUTPUT_PATH").unwrap_or_else(|_| "reports".to_string())
            }
        };

        Self {
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            quarantine_dir: env::var("QUARANTINE_DIR")
                .unwrap_or_else(|_| "quarantine".to_string())
                .into(),
            logs_dir: env::var("LOGS_DIR")
                .unwrap_or_else(|_| "logs".to_string())
                .into(),
            chunk_size: env_parse("CHUNK_SIZE", 100),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", 5),
            report_backend,
            report_path: report_path.into(),
            retry: RetryConfig {
                max_attempts: env_parse("MAX_ATTEMPTS", 5),
                initial_backoff_secs: env_parse("INITIAL_BACKOFF_SECS", 2),
                max_backoff_secs: env_parse("MAX_BACKOFF_SECS", 60),
            },
            schema: SchemaConfig {
                required_fields: env_list("REQUIRED_FIELDS", &["sensor_id", "timestamp"]),
                numeric_fields: env_list(
                    "NUMERIC_FIELDS",
                    &["temp", "humidity", "co", "lpg", "smoke"],
                ),
                boolean_fields: env_list("BOOLEAN_FIELDS", &["light", "motion"]),
                temperature_field: env::var("TEMPERATURE_FIELD")
                    .unwrap_or_else(|_| "temp".to_string()),
                temperature_min: env_parse("TEMPERATURE_MIN", -20.0),
                temperature_max: env_parse("TEMPERATURE_MAX", 50.0),
                humidity_field: env::var("HUMIDITY_FIELD")
                    .unwrap_or_else(|_| "humidity".to_string()),
                humidity_min: env_parse("HUMIDITY_MIN", 0.0),
                humidity_max: env_parse("HUMIDITY_MAX", 100.0),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.schema.temperature_min > self.schema.temperature_max {
            return Err(ConfigError::InvalidValue(format!(
                "temperature range [{}, {}] is inverted",
                self.schema.temperature_min, self.schema.temperature_max
            )));
        }

        if self.schema.humidity_min > self.schema.humidity_max {
            return Err(ConfigError::InvalidValue(format!(
                "humidity range [{}, {}] is inverted",
                self.schema.humidity_min, self.schema.humidity_max
            )));
        }

        if self.schema.required_fields.is_empty() {
            return Err(ConfigError::InvalidValue(
                "REQUIRED_FIELDS cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_list(var: &str, default: &[&str]) -> Vec<String> {
    env::var(var)
        .map(|raw| parse_list(&raw))
        .unwrap_or_else(|_| default.iter().map(|s| s.to_string()).collect())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            data_dir: "data".into(),
            quarantine_dir: "quarantine".into(),
            logs_dir: "logs".into(),
            chunk_size: 100,
            poll_interval_secs: 5,
            report_backend: ReportBackend::Jsonl,
            report_path: "reports".into(),
            retry: RetryConfig {
                max_attempts: 5,
                initial_backoff_secs: 2,
                max_backoff_secs: 60,
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

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut config = test_config();
        config.schema.temperature_min = 60.0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut config = test_config();
        config.poll_interval_secs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_list_trims_and_drops_empties() {
        assert_eq!(
            parse_list("sensor_id, timestamp,,temp "),
            vec!["sensor_id", "timestamp", "temp"]
        );
    }
}
