//! Operator settings

pub mod config;
pub mod constants;

pub use config::{ConfigOverrides, Configuration};
