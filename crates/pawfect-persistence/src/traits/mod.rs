//! Persistence traits for the storage abstraction layer
//!
//! The configuration store talks to storage only through these traits, so
//! the in-memory and embedded (RocksDB) backends are interchangeable.

pub mod config;

pub use config::ConfigPersistence;

use async_trait::async_trait;

use crate::model::StorageMode;

/// Unified persistence service trait
///
/// Implementations are selected at startup from the configured storage mode.
#[async_trait]
pub trait PersistenceService: ConfigPersistence + Send + Sync {
    /// Get the current storage mode
    fn storage_mode(&self) -> StorageMode;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
