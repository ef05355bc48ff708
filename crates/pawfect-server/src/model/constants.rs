//! Settings keys and defaults

/// Default settings file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

/// Prefix of environment variables layered over the settings file
pub const ENV_PREFIX: &str = "PAWFECT";
/// Nesting separator inside environment variable names
/// (`PAWFECT_STORAGE__DATA_DIR` sets `storage.data_dir`)
pub const ENV_SEPARATOR: &str = "__";

pub const STORAGE_MODE_PROPERTY: &str = "storage.mode";
pub const STORAGE_DATA_DIR_PROPERTY: &str = "storage.data_dir";
pub const DEFAULT_DATA_DIR: &str = "data";

pub const LOGS_PATH_PROPERTY: &str = "logs.path";
pub const LOGS_LEVEL_PROPERTY: &str = "logs.level";
pub const LOGS_CONSOLE_PROPERTY: &str = "logs.console";
pub const LOGS_FILE_PROPERTY: &str = "logs.file";

pub const HISTORY_LIMIT_PROPERTY: &str = "history.limit";
