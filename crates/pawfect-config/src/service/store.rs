//! Configuration record store
//!
//! Administrative CRUD over configuration records. Sensitive values are
//! sealed before they reach the persistence layer and masked on every read;
//! this type never returns plaintext secrets or raw ciphertext.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use pawfect_common::crypto::is_sealed;
use pawfect_common::{
    ConfigError, ConfigResult, Encryptor, SENSITIVE_SENTINEL, SYSTEM_ACTOR, looks_sensitive,
};
use pawfect_persistence::{Category, ConfigPersistence, ConfigRecordStorageData, ConfigWrite};

use crate::model::path;
use crate::model::{ConfigHistoryEntry, ConfigurationRecord, SchemaRegistry, SetOptions};
use crate::service::validation::{validate_document, validate_key};

/// Default number of history entries returned when the caller passes 0
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Replace every non-blank value at `sensitive_paths` with the sentinel
pub fn mask(data: &Value, sensitive_paths: &[String]) -> Value {
    let mut masked = data.clone();
    for sensitive in sensitive_paths {
        if let Some(value) = path::get_mut(&mut masked, sensitive)
            && !path::is_blank(value)
        {
            *value = Value::String(SENSITIVE_SENTINEL.to_string());
        }
    }
    masked
}

/// Error for a value that must be sealed but is not a valid envelope
pub(crate) fn unsealed_value_error(encryptor: &Encryptor, value: &str) -> ConfigError {
    match encryptor.open(value) {
        Err(e) => e,
        Ok(_) => ConfigError::AuthenticationFailed,
    }
}

/// Repository of configuration records
pub struct ConfigStore {
    persistence: Arc<dyn ConfigPersistence>,
    encryptor: Encryptor,
    registry: Arc<SchemaRegistry>,
}

impl ConfigStore {
    pub fn new(
        persistence: Arc<dyn ConfigPersistence>,
        encryptor: Encryptor,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            persistence,
            encryptor,
            registry,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn encryptor(&self) -> &Encryptor {
        &self.encryptor
    }

    pub(crate) fn persistence(&self) -> &Arc<dyn ConfigPersistence> {
        &self.persistence
    }

    /// Schema paths plus the paths recorded on the record, sorted and unique
    pub(crate) fn effective_sensitive_paths(&self, key: &str, recorded: &[String]) -> Vec<String> {
        let mut paths: BTreeSet<String> = recorded.iter().cloned().collect();
        if let Some(schema) = self.registry.get(key) {
            paths.extend(schema.sensitive_paths());
        }
        paths.into_iter().collect()
    }

    /// Raw stored record with sealed values intact
    pub(crate) async fn find_stored(
        &self,
        key: &str,
        include_inactive: bool,
    ) -> ConfigResult<Option<ConfigRecordStorageData>> {
        Ok(self
            .persistence
            .config_find_one(key, include_inactive)
            .await?)
    }

    fn masked(&self, stored: ConfigRecordStorageData) -> ConfigurationRecord {
        let sensitive = self.effective_sensitive_paths(&stored.key, &stored.sensitive_paths);
        let mut record = ConfigurationRecord::from(stored);
        record.data = mask(&record.data, &sensitive);
        record
    }

    /// Active record by key, masked
    pub async fn get(&self, key: &str) -> ConfigResult<Option<ConfigurationRecord>> {
        Ok(self.find_stored(key, false).await?.map(|s| self.masked(s)))
    }

    /// Record by key whether active or not, masked
    pub async fn get_including_inactive(
        &self,
        key: &str,
    ) -> ConfigResult<Option<ConfigurationRecord>> {
        Ok(self.find_stored(key, true).await?.map(|s| self.masked(s)))
    }

    /// Active record by key, or `NotFound`
    pub async fn require(&self, key: &str) -> ConfigResult<ConfigurationRecord> {
        self.get(key)
            .await?
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    /// Create or replace the record under `key`
    ///
    /// Sensitive values are sealed; a sensitive value equal to the display
    /// sentinel keeps whatever is stored. Nothing is written when validation
    /// fails. The returned record is masked.
    pub async fn set(
        &self,
        key: &str,
        data: Value,
        actor: &str,
        options: SetOptions,
    ) -> ConfigResult<ConfigurationRecord> {
        validate_key(key)?;
        let schema = self.registry.get(key);
        let existing = self.find_stored(key, true).await?;

        let mut recorded: Vec<String> = options.sensitive_paths.clone();
        if let Some(ex) = &existing {
            recorded.extend(ex.sensitive_paths.iter().cloned());
        }
        let sensitive = self.effective_sensitive_paths(key, &recorded);

        validate_document(schema, &data, &sensitive)?;

        let category = options
            .category
            .or(schema.map(|s| s.category))
            .or(existing.as_ref().map(|e| e.category))
            .unwrap_or(Category::Other);

        for leaf in path::leaf_paths(&data) {
            let name = leaf.rsplit('.').next().unwrap_or(&leaf);
            if looks_sensitive(name) && !sensitive.contains(&leaf) {
                warn!(
                    key,
                    field = %leaf,
                    "Field looks like a secret but is not declared sensitive; storing as plaintext"
                );
            }
        }

        let mut data = data;
        let mut is_encrypted = false;
        for sensitive_path in &sensitive {
            let incoming = match path::get(&data, sensitive_path) {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                _ => continue,
            };

            let sealed = if incoming == SENSITIVE_SENTINEL {
                let stored = existing
                    .as_ref()
                    .and_then(|e| path::get(&e.data, sensitive_path).map(|v| (e, v)))
                    .and_then(|(e, v)| v.as_str().map(|s| (e, s)))
                    .filter(|(_, s)| !s.is_empty());
                match stored {
                    Some((record, value)) if record.is_encrypted => {
                        if !is_sealed(value) {
                            return Err(unsealed_value_error(&self.encryptor, value));
                        }
                        value.to_string()
                    }
                    Some((_, legacy)) => {
                        debug!(key, field = %sensitive_path, "Sealing legacy plaintext value");
                        self.encryptor.seal_async(legacy).await?
                    }
                    None => {
                        path::remove(&mut data, sensitive_path);
                        continue;
                    }
                }
            } else {
                self.encryptor.seal_async(&incoming).await?
            };

            path::set(&mut data, sensitive_path, Value::String(sealed));
            is_encrypted = true;
        }

        let stored = self
            .persistence
            .config_upsert(ConfigWrite {
                key: key.to_string(),
                data,
                is_encrypted,
                category,
                sensitive_paths: sensitive,
                updated_by: if actor.is_empty() {
                    SYSTEM_ACTOR.to_string()
                } else {
                    actor.to_string()
                },
                rotation: false,
            })
            .await?;

        info!(
            key,
            version = stored.version,
            category = %stored.category,
            is_encrypted = stored.is_encrypted,
            actor,
            "Configuration saved"
        );
        Ok(self.masked(stored))
    }

    /// Soft-delete a record. Returns `false` when there was no active record.
    pub async fn deactivate(&self, key: &str, actor: &str) -> ConfigResult<bool> {
        let actor = if actor.is_empty() { SYSTEM_ACTOR } else { actor };
        let deactivated = self.persistence.config_deactivate(key, actor).await?;
        if deactivated {
            info!(key, actor, "Configuration deactivated");
        }
        Ok(deactivated)
    }

    /// Active records of a category ordered by key, masked
    pub async fn list_by_category(
        &self,
        category: Category,
    ) -> ConfigResult<Vec<ConfigurationRecord>> {
        let records = self.persistence.config_find_by_category(category).await?;
        Ok(records.into_iter().map(|s| self.masked(s)).collect())
    }

    /// All active records ordered by key, masked
    pub async fn list_all(&self) -> ConfigResult<Vec<ConfigurationRecord>> {
        let records = self.persistence.config_find_all(false).await?;
        Ok(records.into_iter().map(|s| self.masked(s)).collect())
    }

    /// Audit trail of a key, newest first, masked
    pub async fn history(&self, key: &str, limit: usize) -> ConfigResult<Vec<ConfigHistoryEntry>> {
        let limit = if limit == 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            limit
        };
        let entries = self.persistence.config_history(key, limit).await?;
        Ok(entries
            .into_iter()
            .map(|stored| {
                let sensitive = self.effective_sensitive_paths(key, &stored.sensitive_paths);
                let mut entry = ConfigHistoryEntry::from(stored);
                entry.data = mask(&entry.data, &sensitive);
                entry
            })
            .collect())
    }
}
