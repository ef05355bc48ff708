//! Configuration records as seen by callers of the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pawfect_persistence::{Category, ConfigHistoryStorageData, ConfigRecordStorageData, OpType};

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// A configuration record
///
/// Records returned by `ConfigStore` are always masked: every non-empty
/// sensitive value is replaced with the display sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    pub key: String,
    pub data: Value,
    pub is_encrypted: bool,
    pub category: Category,
    pub version: u64,
    pub is_active: bool,
    pub updated_by: String,
    pub sensitive_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConfigRecordStorageData> for ConfigurationRecord {
    fn from(stored: ConfigRecordStorageData) -> Self {
        Self {
            key: stored.key,
            data: stored.data,
            is_encrypted: stored.is_encrypted,
            category: stored.category,
            version: stored.version,
            is_active: stored.is_active,
            updated_by: stored.updated_by,
            sensitive_paths: stored.sensitive_paths,
            created_at: from_millis(stored.created_time),
            updated_at: from_millis(stored.modified_time),
        }
    }
}

/// One audit trail snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigHistoryEntry {
    pub id: u64,
    pub key: String,
    pub version: u64,
    pub op_type: OpType,
    pub data: Value,
    pub category: Category,
    pub is_active: bool,
    pub is_encrypted: bool,
    pub sensitive_paths: Vec<String>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<ConfigHistoryStorageData> for ConfigHistoryEntry {
    fn from(stored: ConfigHistoryStorageData) -> Self {
        Self {
            id: stored.id,
            key: stored.key,
            version: stored.version,
            op_type: stored.op_type,
            data: stored.data,
            category: stored.category,
            is_active: stored.is_active,
            is_encrypted: stored.is_encrypted,
            sensitive_paths: stored.sensitive_paths,
            updated_by: stored.updated_by,
            created_at: from_millis(stored.created_time),
        }
    }
}

/// Options for `ConfigStore::set`
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Overrides the schema category
    pub category: Option<Category>,
    /// Extra paths to seal on top of the schema's sensitive fields
    pub sensitive_paths: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn sensitive_path(mut self, path: impl Into<String>) -> Self {
        self.sensitive_paths.push(path.into());
        self
    }
}

/// SMTP settings for the email sender, read from the `analytics` subsystem
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailServiceSettings {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub from: String,
}
