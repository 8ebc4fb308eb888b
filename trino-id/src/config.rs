//! trino-id specific configuration

use std::path::{Path, PathBuf};
use trino_common::config::{resolve_data_dir, TomlConfig};

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5730;

/// Identification service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub model_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub port: u16,
}

impl Config {
    /// Resolve the effective configuration from CLI arguments, the
    /// `TRINO_DATA_DIR` environment variable, and the TOML config file,
    /// in that priority order.
    pub fn resolve(
        cli_data_dir: Option<&Path>,
        cli_port: Option<u16>,
        cli_model_path: Option<&Path>,
        toml_config: &TomlConfig,
    ) -> Self {
        let data_dir = resolve_data_dir(cli_data_dir, "TRINO_DATA_DIR", toml_config);
        let db_path = data_dir.join("trino.db");
        let model_path = cli_model_path
            .map(Path::to_path_buf)
            .or_else(|| toml_config.model_path.clone())
            .unwrap_or_else(|| data_dir.join("model.safetensors"));
        let ffmpeg_path = toml_config
            .ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let port = cli_port
            .or(toml_config.port)
            .unwrap_or(DEFAULT_PORT);

        Self {
            data_dir,
            db_path,
            model_path,
            ffmpeg_path,
            port,
        }
    }
}
