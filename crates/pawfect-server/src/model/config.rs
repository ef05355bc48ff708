//! Settings for the operator tooling
//!
//! Layers, lowest first: `conf/application.yml`, `PAWFECT_*` environment
//! variables, command line overrides.

use std::path::PathBuf;

use anyhow::Context;
use config::{Config, Environment, File};
use pawfect_config::DEFAULT_HISTORY_LIMIT;
use pawfect_persistence::StorageMode;

use crate::startup::LoggingConfig;

use super::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_DATA_DIR, ENV_PREFIX, ENV_SEPARATOR, HISTORY_LIMIT_PROPERTY,
    LOGS_CONSOLE_PROPERTY, LOGS_FILE_PROPERTY, LOGS_LEVEL_PROPERTY, LOGS_PATH_PROPERTY,
    STORAGE_DATA_DIR_PROPERTY, STORAGE_MODE_PROPERTY,
};

/// Values given on the command line; they win over file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub storage: Option<StorageMode>,
    pub data_dir: Option<PathBuf>,
}

/// Application settings loaded from the settings file and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new(overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        let file = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        // The default file is optional so the tool works from any directory
        let required = overrides.config_file.is_some();

        let mut builder = Config::builder()
            .add_source(File::from(file.as_path()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );

        if let Some(mode) = overrides.storage {
            builder = builder.set_override(STORAGE_MODE_PROPERTY, mode.to_string())?;
        }
        if let Some(dir) = &overrides.data_dir {
            builder = builder.set_override(
                STORAGE_DATA_DIR_PROPERTY,
                dir.to_string_lossy().into_owned(),
            )?;
        }

        let config = builder
            .build()
            .with_context(|| format!("Failed to load settings from {}", file.display()))?;
        Ok(Configuration { config })
    }

    // ========================================================================
    // Storage
    // ========================================================================

    pub fn storage_mode(&self) -> anyhow::Result<StorageMode> {
        match self.config.get_string(STORAGE_MODE_PROPERTY) {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {}: {}", STORAGE_MODE_PROPERTY, e)),
            Err(_) => Ok(StorageMode::Embedded),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config
            .get_string(STORAGE_DATA_DIR_PROPERTY)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn history_limit(&self) -> usize {
        self.config
            .get_int(HISTORY_LIMIT_PROPERTY)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    // ========================================================================
    // Logging
    // ========================================================================

    /// Logging settings; `PAWFECT_LOG_*` variables win over the settings file
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string(LOGS_PATH_PROPERTY).ok(),
            self.config.get_bool(LOGS_CONSOLE_PROPERTY).unwrap_or(true),
            self.config.get_bool(LOGS_FILE_PROPERTY).unwrap_or(false),
            self.config
                .get_string(LOGS_LEVEL_PROPERTY)
                .unwrap_or_else(|_| "info".to_string()),
        )
        .with_env_overrides()
    }
}
