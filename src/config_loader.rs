use crate::backup_decoder::{MAX_BACKUP_BYTES, READ_CHUNK_BYTES};
use crate::error_log::ERROR_LOG_FILE_NAME;
use crate::errors::{BackupError, BackupResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "tsundoku.toml";
pub const CONFIG_PATH_ENV: &str = "TSUNDOKU_CONFIG";
pub const ENV_PREFIX: &str = "TSUNDOKU_";

const APP_DIR: &str = "tsundoku";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackerConfig {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub logged_in: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackupConfig {
    pub max_decode_bytes: u64,
    pub read_chunk_bytes: usize,
    pub error_log_dir: PathBuf,
    pub error_log_name: String,
    pub store_path: PathBuf,
    #[serde(default)]
    pub installed_sources: Vec<i64>,
    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_decode_bytes: MAX_BACKUP_BYTES,
            read_chunk_bytes: READ_CHUNK_BYTES,
            error_log_dir: default_error_log_dir(),
            error_log_name: ERROR_LOG_FILE_NAME.to_string(),
            store_path: default_store_path(),
            installed_sources: Vec::new(),
            trackers: Vec::new(),
        }
    }
}

fn default_error_log_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(std::env::temp_dir)
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("library"))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR).join("library"))
}

/// Load configuration: defaults, then the TOML file, then `TSUNDOKU_*`
/// environment variables.
///
/// `path` overrides the file location; otherwise `TSUNDOKU_CONFIG` or
/// `tsundoku.toml` in the working directory is used. A missing file is not
/// an error.
pub fn load_config(path: Option<&Path>) -> BackupResult<BackupConfig> {
    let file = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
    };

    let figment = Figment::from(Serialized::defaults(BackupConfig::default()))
        .merge(Toml::file(&file))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]));

    let config: BackupConfig = figment.extract()?;
    config.validate()?;

    tracing::debug!(file = %file.display(), "configuration loaded");
    Ok(config)
}

impl BackupConfig {
    pub fn validate(&self) -> BackupResult<()> {
        if self.max_decode_bytes == 0 {
            return Err(BackupError::config("max_decode_bytes must be greater than zero"));
        }
        if self.read_chunk_bytes == 0 {
            return Err(BackupError::config("read_chunk_bytes must be greater than zero"));
        }
        if self.error_log_name.trim().is_empty() {
            return Err(BackupError::config("error_log_name must be set"));
        }
        Ok(())
    }
}
