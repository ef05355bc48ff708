// Embedded persistence backend using RocksDB
// Provides standalone (single-node) storage without an external database

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use tracing::{debug, info};

use crate::model::{
    Category, ConfigHistoryStorageData, ConfigRecordStorageData, ConfigWrite, HistoryIdGenerator,
    OpType, StorageMode, now_millis,
};
use crate::traits::PersistenceService;
use crate::traits::config::ConfigPersistence;

pub const CF_CONFIG: &str = "config";
pub const CF_CONFIG_HISTORY: &str = "config_history";

/// Standalone embedded persistence using RocksDB
///
/// Records live in the `config` column family keyed by configuration key;
/// history lives in `config_history` keyed by `{key}@@{version}` with the
/// version zero-padded so byte order equals version order. Values are JSON.
pub struct EmbeddedPersistService {
    db: Arc<DB>,
    write_lock: Mutex<()>,
    history_ids: HistoryIdGenerator,
}

impl EmbeddedPersistService {
    /// Open (or create) a database under `path`
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_CONFIG, cf_opts.clone()),
            ColumnFamilyDescriptor::new(CF_CONFIG_HISTORY, cf_opts),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cfs)
            .map_err(|e| anyhow::anyhow!("Failed to open RocksDB: {}", e))?;
        info!(path = %path.as_ref().display(), "Opened embedded configuration store");
        Ok(Self::new(Arc::new(db)))
    }

    /// Create from a raw RocksDB instance that already has the column families
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            history_ids: HistoryIdGenerator::new(),
        }
    }

    /// Build the history key of a record version
    pub fn history_key(key: &str, version: u64) -> String {
        format!("{}@@{:020}", key, version)
    }

    /// Get a column family handle
    fn cf(&self, name: &str) -> anyhow::Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", name))
    }

    /// Write a JSON value to a column family
    fn put_json<T: serde::Serialize>(&self, cf_name: &str, key: &str, value: &T) -> anyhow::Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db
            .put_cf(cf, key.as_bytes(), bytes)
            .map_err(|e| anyhow::anyhow!("RocksDB put error: {}", e))
    }

    fn get_record(&self, key: &str) -> anyhow::Result<Option<ConfigRecordStorageData>> {
        let cf = self.cf(CF_CONFIG)?;
        match self
            .db
            .get_cf(cf, key.as_bytes())
            .map_err(|e| anyhow::anyhow!("RocksDB get error: {}", e))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_records<F>(&self, mut keep: F) -> anyhow::Result<Vec<ConfigRecordStorageData>>
    where
        F: FnMut(&ConfigRecordStorageData) -> bool,
    {
        let cf = self.cf(CF_CONFIG)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| anyhow::anyhow!("RocksDB iterator error: {}", e))?;
            let record: ConfigRecordStorageData = serde_json::from_slice(&value)?;
            if keep(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn write_with_history(
        &self,
        record: &ConfigRecordStorageData,
        op_type: OpType,
    ) -> anyhow::Result<()> {
        let entry =
            ConfigHistoryStorageData::snapshot(self.history_ids.next_id(), record, op_type);

        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(
            self.cf(CF_CONFIG)?,
            record.key.as_bytes(),
            serde_json::to_vec(record)?,
        );
        batch.put_cf(
            self.cf(CF_CONFIG_HISTORY)?,
            Self::history_key(&record.key, record.version).as_bytes(),
            serde_json::to_vec(&entry)?,
        );
        self.db
            .write(batch)
            .map_err(|e| anyhow::anyhow!("RocksDB batch write error: {}", e))
    }

    fn upsert_locked(&self, write: ConfigWrite) -> anyhow::Result<ConfigRecordStorageData> {
        let _guard = self.write_lock.lock();
        let existing = self.get_record(&write.key)?;
        let (record, op_type) =
            ConfigRecordStorageData::next(existing.as_ref(), write, now_millis());
        self.write_with_history(&record, op_type)?;
        debug!(
            key = %record.key,
            version = record.version,
            op_type = %op_type,
            "Stored configuration record in RocksDB"
        );
        Ok(record)
    }

    fn deactivate_locked(&self, key: &str, updated_by: &str) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock();
        let Some(existing) = self.get_record(key)? else {
            return Ok(false);
        };
        if !existing.is_active {
            return Ok(false);
        }
        let record = existing.deactivated(updated_by, now_millis());
        self.write_with_history(&record, OpType::Delete)?;
        Ok(true)
    }

    /// Overwrite a record without touching history. Used to seed data that
    /// predates this store.
    pub fn import_record(&self, record: &ConfigRecordStorageData) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        self.put_json(CF_CONFIG, &record.key, record)
    }
}

#[async_trait]
impl ConfigPersistence for EmbeddedPersistService {
    async fn config_find_one(
        &self,
        key: &str,
        include_inactive: bool,
    ) -> anyhow::Result<Option<ConfigRecordStorageData>> {
        Ok(self
            .get_record(key)?
            .filter(|r| include_inactive || r.is_active))
    }

    async fn config_upsert(&self, write: ConfigWrite) -> anyhow::Result<ConfigRecordStorageData> {
        self.upsert_locked(write)
    }

    async fn config_deactivate(&self, key: &str, updated_by: &str) -> anyhow::Result<bool> {
        self.deactivate_locked(key, updated_by)
    }

    async fn config_find_by_category(
        &self,
        category: Category,
    ) -> anyhow::Result<Vec<ConfigRecordStorageData>> {
        self.scan_records(|r| r.is_active && r.category == category)
    }

    async fn config_find_all(
        &self,
        include_inactive: bool,
    ) -> anyhow::Result<Vec<ConfigRecordStorageData>> {
        self.scan_records(|r| include_inactive || r.is_active)
    }

    async fn config_history(
        &self,
        key: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ConfigHistoryStorageData>> {
        let prefix = format!("{}@@", key);
        let cf = self.cf(CF_CONFIG_HISTORY)?;

        let mut entries = Vec::new();
        let iter = self.db.prefix_iterator_cf(cf, prefix.as_bytes());
        for item in iter {
            let (key, value) =
                item.map_err(|e| anyhow::anyhow!("RocksDB iterator error: {}", e))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            entries.push(serde_json::from_slice::<ConfigHistoryStorageData>(&value)?);
        }

        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait]
impl PersistenceService for EmbeddedPersistService {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Embedded
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.cf(CF_CONFIG)?;
        self.cf(CF_CONFIG_HISTORY)?;
        Ok(())
    }
}
