//! Application settings persisted as TOML in the app directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::player::VerifyConfig;
use crate::track_data::{BATCH_CONCURRENCY, DEFAULT_SCALE};

/// Default filename used to store the settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors from loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The application directory could not be resolved.
    #[error(transparent)]
    AppDir(#[from] app_dirs::AppDirError),
    /// Failed to read the settings file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The settings file is not valid TOML.
    #[error("Failed to parse {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize the settings.
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Failed to create the settings directory.
    #[error("Failed to prepare {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the settings file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Tunable settings for the track-data pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory served by the filesystem blob store, when set.
    pub storage_root: Option<PathBuf>,
    /// Samples per peak window for generated artifacts.
    pub peak_scale: u32,
    /// Concurrency cap for batched artifact retrieval.
    pub batch_concurrency: usize,
    /// Attempts in the post-save visibility re-check loop.
    pub verify_max_attempts: usize,
    /// Backoff unit in milliseconds for the re-check loop.
    pub verify_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let verify = VerifyConfig::default();
        Self {
            storage_root: None,
            peak_scale: DEFAULT_SCALE,
            batch_concurrency: BATCH_CONCURRENCY,
            verify_max_attempts: verify.max_attempts,
            verify_backoff_ms: verify.backoff_step.as_millis() as u64,
        }
    }
}

impl Settings {
    /// Clamp fields into their valid ranges.
    pub fn normalized(mut self) -> Self {
        if self.peak_scale == 0 {
            self.peak_scale = DEFAULT_SCALE;
        }
        self.batch_concurrency = self.batch_concurrency.max(1);
        self.verify_max_attempts = self.verify_max_attempts.max(1);
        self
    }

    /// Verification settings derived from these values.
    pub fn verify_config(&self) -> VerifyConfig {
        VerifyConfig {
            max_attempts: self.verify_max_attempts,
            backoff_step: std::time::Duration::from_millis(self.verify_backoff_ms),
        }
    }
}

/// Resolve the settings file path inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir()?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from disk, returning defaults if the file is missing.
pub fn load_or_default() -> Result<Settings, ConfigError> {
    load_from_path(&config_path()?)
}

/// Load settings from a specific path, returning defaults if missing.
pub fn load_from_path(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: Settings = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(settings.normalized())
}

/// Persist settings to the app directory, overwriting previous contents.
pub fn save(settings: &Settings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Save settings to a specific path, creating parent directories as needed.
pub fn save_to_path(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(settings)?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_from_path(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = Settings {
            storage_root: Some(PathBuf::from("/srv/audio")),
            peak_scale: 512,
            batch_concurrency: 3,
            verify_max_attempts: 4,
            verify_backoff_ms: 100,
        };
        save_to_path(&settings, &path).unwrap();
        assert_eq!(load_from_path(&path).unwrap(), settings);
    }

    #[test]
    fn normalization_repairs_zeroes() {
        let settings = Settings {
            peak_scale: 0,
            batch_concurrency: 0,
            verify_max_attempts: 0,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.peak_scale, DEFAULT_SCALE);
        assert_eq!(settings.batch_concurrency, 1);
        assert_eq!(settings.verify_max_attempts, 1);
    }

    #[test]
    fn partial_files_fall_back_to_defaults_per_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "peak_scale = 128\n").unwrap();
        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.peak_scale, 128);
        assert_eq!(settings.batch_concurrency, BATCH_CONCURRENCY);
    }
}
