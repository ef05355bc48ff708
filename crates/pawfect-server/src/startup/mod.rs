//! Application startup utilities

pub mod logging;
pub mod services;

pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use services::{AppServices, init_services};
