//! File-based logging with per-component files.
//!
//! Besides the console, events go to daily rotated files:
//!
//! | Log File          | Component                        | Target Prefixes            |
//! |-------------------|----------------------------------|----------------------------|
//! | pawfect.log       | Root logger (all components)     | (all)                      |
//! | crypto.log        | Sealing, opening, key providers  | pawfect_common::crypto     |
//! | config-store.log  | Store, resolver, key rotation    | pawfect_config             |
//! | persistence.log   | Storage backends                 | pawfect_persistence        |
//!
//! Log files are stored in `~/pawfect/logs` by default.
//! Override with `PAWFECT_LOG_DIR` or `logs.path` in the settings file.

use std::path::PathBuf;

use pawfect_common::{EnvSource, ProcessEnv};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub const LOG_DIR_ENV: &str = "PAWFECT_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "PAWFECT_LOG_LEVEL";
pub const LOG_CONSOLE_ENV: &str = "PAWFECT_LOG_CONSOLE";
pub const LOG_FILE_ENV: &str = "PAWFECT_LOG_FILE";

const ROOT_LOG_FILE: &str = "pawfect.log";

/// Internal definition for a component log file.
struct ComponentLogDef {
    /// Log file name (e.g. "crypto.log")
    file_name: &'static str,
    /// Target module prefixes routed to this file
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "crypto.log",
        targets: &["pawfect_common::crypto"],
    },
    ComponentLogDef {
        file_name: "config-store.log",
        targets: &["pawfect_config"],
    },
    ComponentLogDef {
        file_name: "persistence.log",
        targets: &["pawfect_persistence"],
    },
];

/// Log rotation policy
#[derive(Debug, Clone, Copy)]
pub enum LogRotation {
    /// Rotate daily (default)
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/pawfect/logs", home))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Logging configuration for the entire application.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base log directory (default: `~/pawfect/logs`)
    pub log_dir: PathBuf,
    /// Enable console output (stderr, so command output on stdout stays clean)
    pub console_output: bool,
    /// Console log level
    pub console_level: Level,
    /// Enable file logging
    pub file_logging: bool,
    /// Default log level for files
    pub file_level: Level,
    /// Log rotation policy
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: false,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Create from application configuration.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: String,
    ) -> Self {
        let log_dir = log_dir.map(PathBuf::from).unwrap_or_else(default_log_dir);
        let level = level.parse().unwrap_or(Level::INFO);

        Self {
            log_dir,
            console_output,
            console_level: level,
            file_logging,
            file_level: level,
            rotation: LogRotation::Daily,
        }
    }

    /// Apply `PAWFECT_LOG_*` variables from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_env_source(&ProcessEnv)
    }

    pub fn with_env_source(mut self, env: &dyn EnvSource) -> Self {
        if let Some(dir) = env.var(LOG_DIR_ENV).filter(|v| !v.is_empty()) {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(level) = env.var(LOG_LEVEL_ENV).and_then(|v| v.parse().ok()) {
            self.console_level = level;
            self.file_level = level;
        }
        if let Some(console) = env.var(LOG_CONSOLE_ENV).and_then(|v| parse_flag(&v)) {
            self.console_output = console;
        }
        if let Some(file) = env.var(LOG_FILE_ENV).and_then(|v| parse_flag(&v)) {
            self.file_logging = file;
        }
        self
    }
}

/// Guard that keeps the logging system alive.
///
/// Must be kept alive for the duration of the application. When dropped,
/// all buffered log output is flushed.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Initialize the logging system with console and multi-file output.
///
/// `RUST_LOG` controls the console and root file levels when set. Component
/// log files use per-layer [`Targets`] filters to route events by their
/// tracing target (module path).
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let file_level: LevelFilter = config.file_level.into();
            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, file_level);
            }

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(targets);
            layers.push(Box::new(layer));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::debug!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
