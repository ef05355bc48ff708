//! Configuration data models
//!
//! This module contains data structures for configuration management:
//! - Records and history entries returned to callers
//! - Subsystem schemas and the schema registry
//! - Dotted path helpers for JSON documents

pub mod path;
pub mod record;
pub mod schema;

pub use record::*;
pub use schema::*;
