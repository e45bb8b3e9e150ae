//! Pipeline entry point
//!
//! Watches the data directory for CSV sensor chunks and runs each new file
//! through validate → process → aggregate, persisting the aggregate views.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release
//! ```
//!
//! ## Environment Variables
//!
//! See `PipelineConfig::from_env` for the full list; the common ones:
//! - DATA_DIR - watched drop directory (default: data)
//! - QUARANTINE_DIR - destination for invalid chunks (default: quarantine)
//! - LOGS_DIR - quarantine log directory (default: logs)
//! - POLL_INTERVAL_SECS - seconds between poll cycles (default: 5)
//! - REPORT_BACKEND - jsonl | sqlite (default: jsonl)
//! - RUST_LOG - logging level (optional, default: info)

use iotflow::config::PipelineConfig;
use iotflow::intake::FileMonitor;
use iotflow::pipeline::ChunkPipeline;
use iotflow::report::ReportWriter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = PipelineConfig::from_env();
    config.validate()?;

    // Runtime directories must exist before anything opens files in them
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.quarantine_dir)?;
    std::fs::create_dir_all(&config.logs_dir)?;

    log::info!("🚀 Starting IotFlow pipeline");
    log::info!("   Data dir: {}", config.data_dir.display());
    log::info!("   Quarantine dir: {}", config.quarantine_dir.display());
    log::info!("   Logs dir: {}", config.logs_dir.display());
    log::info!("   Poll interval: {}s", config.poll_interval_secs);
    log::info!(
        "   Retry budget: {} attempts ({}-{}s backoff)",
        config.retry.max_attempts,
        config.retry.initial_backoff_secs,
        config.retry.max_backoff_secs
    );

    let writer = ReportWriter::new(config.report_backend, config.report_path.clone())?;
    log::info!("📊 Report backend: {}", writer.backend_type());

    let mut pipeline = ChunkPipeline::new(config.clone(), writer);
    let mut monitor = FileMonitor::new(&config);

    monitor.run(&mut pipeline).await;

    Ok(())
}
