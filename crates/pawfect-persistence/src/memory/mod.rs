// In-memory persistence backend
// Process-local storage for tests, local tooling and ephemeral deployments

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::model::{
    Category, ConfigHistoryStorageData, ConfigRecordStorageData, ConfigWrite, HistoryIdGenerator,
    OpType, StorageMode, now_millis,
};
use crate::traits::PersistenceService;
use crate::traits::config::ConfigPersistence;

/// In-memory persistence backed by concurrent maps
///
/// Reads are lock-free; writes go through a single mutex so the
/// read-modify-write of a version bump is atomic.
#[derive(Default)]
pub struct MemoryPersistService {
    configs: DashMap<String, ConfigRecordStorageData>,
    history: DashMap<String, Vec<ConfigHistoryStorageData>>,
    write_lock: Mutex<()>,
    history_ids: HistoryIdGenerator,
}

impl MemoryPersistService {
    pub fn new() -> Self {
        Self::default()
    }

    fn append_history(&self, record: &ConfigRecordStorageData, op_type: OpType) {
        let entry =
            ConfigHistoryStorageData::snapshot(self.history_ids.next_id(), record, op_type);
        self.history
            .entry(record.key.clone())
            .or_default()
            .push(entry);
    }

    fn upsert_locked(&self, write: ConfigWrite) -> ConfigRecordStorageData {
        let _guard = self.write_lock.lock();
        let existing = self.configs.get(&write.key).map(|r| r.value().clone());
        let (record, op_type) =
            ConfigRecordStorageData::next(existing.as_ref(), write, now_millis());

        self.configs.insert(record.key.clone(), record.clone());
        self.append_history(&record, op_type);
        debug!(
            key = %record.key,
            version = record.version,
            op_type = %op_type,
            "Stored configuration record in memory"
        );
        record
    }

    fn deactivate_locked(&self, key: &str, updated_by: &str) -> bool {
        let _guard = self.write_lock.lock();
        let Some(existing) = self.configs.get(key).map(|r| r.value().clone()) else {
            return false;
        };
        if !existing.is_active {
            return false;
        }

        let record = existing.deactivated(updated_by, now_millis());
        self.configs.insert(record.key.clone(), record.clone());
        self.append_history(&record, OpType::Delete);
        true
    }

    /// Overwrite a record without touching history. Used to seed data that
    /// predates this store.
    pub fn import_record(&self, record: ConfigRecordStorageData) {
        let _guard = self.write_lock.lock();
        self.configs.insert(record.key.clone(), record);
    }

    fn sorted(mut records: Vec<ConfigRecordStorageData>) -> Vec<ConfigRecordStorageData> {
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

#[async_trait]
impl ConfigPersistence for MemoryPersistService {
    async fn config_find_one(
        &self,
        key: &str,
        include_inactive: bool,
    ) -> anyhow::Result<Option<ConfigRecordStorageData>> {
        Ok(self
            .configs
            .get(key)
            .map(|r| r.value().clone())
            .filter(|r| include_inactive || r.is_active))
    }

    async fn config_upsert(&self, write: ConfigWrite) -> anyhow::Result<ConfigRecordStorageData> {
        Ok(self.upsert_locked(write))
    }

    async fn config_deactivate(&self, key: &str, updated_by: &str) -> anyhow::Result<bool> {
        Ok(self.deactivate_locked(key, updated_by))
    }

    async fn config_find_by_category(
        &self,
        category: Category,
    ) -> anyhow::Result<Vec<ConfigRecordStorageData>> {
        let records = self
            .configs
            .iter()
            .filter(|r| r.is_active && r.category == category)
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(records))
    }

    async fn config_find_all(
        &self,
        include_inactive: bool,
    ) -> anyhow::Result<Vec<ConfigRecordStorageData>> {
        let records = self
            .configs
            .iter()
            .filter(|r| include_inactive || r.is_active)
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(records))
    }

    async fn config_history(
        &self,
        key: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ConfigHistoryStorageData>> {
        Ok(self
            .history
            .get(key)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl PersistenceService for MemoryPersistService {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Memory
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
