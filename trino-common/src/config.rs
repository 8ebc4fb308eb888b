//! Configuration loading and data directory resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// TOML configuration file schema.
///
/// All fields are optional; missing values fall back to compiled defaults
/// so a missing or partial config file never prevents startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Data directory holding the database and model files
    pub data_dir: Option<PathBuf>,
    /// HTTP listen port
    pub port: Option<u16>,
    /// Path to the classifier checkpoint (safetensors)
    pub model_path: Option<PathBuf>,
    /// Path to the ffmpeg binary used for container transcoding
    pub ffmpeg_path: Option<PathBuf>,
    /// Log level directive (e.g. "info", "trino_id=debug")
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Load a TOML config file. A missing file yields defaults; a file
    /// that exists but fails to parse is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("trino").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/trino/config.toml"))
}

/// Data directory resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_dir(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.data_dir {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_data_dir()
}

/// Get OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("trino"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/trino"))
}

/// Ensure the data directory exists, creating it if necessary
pub fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        std::fs::create_dir_all(data_dir)?;
        tracing::info!("Created data directory: {}", data_dir.display());
    }
    Ok(())
}
