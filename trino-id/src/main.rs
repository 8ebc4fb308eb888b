//! trino-id — Bird species identification service
//!
//! Startup sequence: tracing, configuration resolution, database
//! initialization, classifier load, catalog/model width validation, then
//! the HTTP server. A catalog whose size disagrees with the model output
//! width is a fatal configuration error, not a silent misprediction.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use trino_common::config::{default_config_path, ensure_data_dir, TomlConfig};
use trino_common::db::init_database;
use trino_id::api::{self, AppContext};
use trino_id::config::Config;
use trino_id::db::{validate_catalog_width, ErrorSink, HistoryRecorder, SpeciesCatalog};
use trino_id::pipeline::classify::{Classifier, CnnClassifier};
use trino_id::pipeline::Pipeline;
use trino_id::transcode::FfmpegTranscoder;

#[derive(Parser, Debug)]
#[command(name = "trino-id", about = "Bird species identification service")]
struct Args {
    /// Data directory (overrides TRINO_DATA_DIR and the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    /// Classifier checkpoint path (safetensors)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let toml_config = TomlConfig::load(&config_path)?;

    // RUST_LOG wins; otherwise the config file's log_level, then "info"
    let default_directive = toml_config.log_level.clone().unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .init();

    info!(
        "Starting TRINO Identification (trino-id) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::resolve(
        args.data_dir.as_deref(),
        args.port,
        args.model.as_deref(),
        &toml_config,
    );

    ensure_data_dir(&config.data_dir)?;
    info!("Data directory: {}", config.data_dir.display());

    let pool = init_database(&config.db_path).await?;

    let classifier = CnnClassifier::load(&config.model_path)
        .with_context(|| format!("loading classifier from {}", config.model_path.display()))?;
    info!(
        "✓ Loaded classifier ({} classes) from {}",
        classifier.output_width(),
        config.model_path.display()
    );

    let catalog = SpeciesCatalog::new(pool.clone());
    validate_catalog_width(&catalog, &classifier).await?;
    info!(
        "✓ Species catalog matches model output width ({} entries)",
        classifier.output_width()
    );

    let pipeline = Pipeline::new(
        Arc::new(classifier),
        Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone())),
        catalog,
    );

    let ctx = AppContext {
        pipeline: Arc::new(pipeline),
        history: HistoryRecorder::new(pool.clone()),
        error_sink: ErrorSink::new(pool),
    };

    api::run(&config, ctx).await?;

    Ok(())
}
