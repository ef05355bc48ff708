//! Config persistence trait
//!
//! Defines the interface for configuration record storage operations.

use async_trait::async_trait;

use crate::model::{Category, ConfigHistoryStorageData, ConfigRecordStorageData, ConfigWrite};

/// Configuration persistence operations
///
/// Implementations serialize their own read-modify-write paths so that record
/// versions stay strictly increasing per key.
#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    /// Find a record by key. Inactive records are only returned when
    /// `include_inactive` is set.
    async fn config_find_one(
        &self,
        key: &str,
        include_inactive: bool,
    ) -> anyhow::Result<Option<ConfigRecordStorageData>>;

    /// Create or replace a record and append a history entry.
    ///
    /// Creates with version 1, otherwise increments the stored version. The
    /// stored record is always active afterwards.
    async fn config_upsert(&self, write: ConfigWrite) -> anyhow::Result<ConfigRecordStorageData>;

    /// Soft-delete a record. Returns `false` when the key is absent or
    /// already inactive.
    async fn config_deactivate(&self, key: &str, updated_by: &str) -> anyhow::Result<bool>;

    /// Active records of a category, ordered by key ascending
    async fn config_find_by_category(
        &self,
        category: Category,
    ) -> anyhow::Result<Vec<ConfigRecordStorageData>>;

    /// All records ordered by key ascending
    async fn config_find_all(
        &self,
        include_inactive: bool,
    ) -> anyhow::Result<Vec<ConfigRecordStorageData>>;

    /// History entries of a key, newest first, at most `limit`
    async fn config_history(
        &self,
        key: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ConfigHistoryStorageData>>;
}
