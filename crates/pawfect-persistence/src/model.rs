//! Domain model types for the persistence abstraction layer
//!
//! These types are used as inputs and return values of the persistence
//! traits, decoupled from specific storage backends.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Configuration category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Payment,
    Ai,
    Maps,
    Storage,
    Email,
    Sms,
    Analytics,
    Security,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Payment,
        Category::Ai,
        Category::Maps,
        Category::Storage,
        Category::Email,
        Category::Sms,
        Category::Analytics,
        Category::Security,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Payment => "payment",
            Category::Ai => "ai",
            Category::Maps => "maps",
            Category::Storage => "storage",
            Category::Email => "email",
            Category::Sms => "sms",
            Category::Analytics => "analytics",
            Category::Security => "security",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Invalid category: {}", s))
    }
}

/// History operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    #[serde(rename = "I")]
    Insert,
    #[serde(rename = "U")]
    Update,
    #[serde(rename = "D")]
    Delete,
    #[serde(rename = "R")]
    Rotate,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Insert => "I",
            OpType::Update => "U",
            OpType::Delete => "D",
            OpType::Rotate => "R",
        }
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage mode for the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Process-local maps, lost on exit
    #[default]
    Memory,
    /// Standalone embedded RocksDB
    Embedded,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Memory => write!(f, "memory"),
            StorageMode::Embedded => write!(f, "embedded"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageMode::Memory),
            "embedded" => Ok(StorageMode::Embedded),
            _ => Err(format!("Invalid storage mode: {}", s)),
        }
    }
}

/// Configuration record as stored by backends
///
/// `data` holds sensitive values sealed in place; backends never see
/// plaintext secrets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecordStorageData {
    pub key: String,
    pub data: serde_json::Value,
    pub is_encrypted: bool,
    pub category: Category,
    pub version: u64,
    pub is_active: bool,
    pub updated_by: String,
    #[serde(default)]
    pub sensitive_paths: Vec<String>,
    pub created_time: i64,
    pub modified_time: i64,
}

/// Config history entry stored by backends
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigHistoryStorageData {
    pub id: u64,
    pub key: String,
    pub version: u64,
    pub op_type: OpType,
    pub data: serde_json::Value,
    pub category: Category,
    pub is_active: bool,
    pub is_encrypted: bool,
    #[serde(default)]
    pub sensitive_paths: Vec<String>,
    pub updated_by: String,
    pub created_time: i64,
}

/// A write request handed to `ConfigPersistence::config_upsert`
///
/// The backend owns version numbering and timestamps.
#[derive(Clone, Debug)]
pub struct ConfigWrite {
    pub key: String,
    pub data: serde_json::Value,
    pub is_encrypted: bool,
    pub category: Category,
    pub sensitive_paths: Vec<String>,
    pub updated_by: String,
    /// Record the write as a key rotation instead of an update
    pub rotation: bool,
}

impl ConfigRecordStorageData {
    /// Build the record that results from applying `write` on top of
    /// `existing`. Versions continue from the existing record, active or not.
    pub fn next(existing: Option<&Self>, write: ConfigWrite, now: i64) -> (Self, OpType) {
        let (version, created_time, op_type) = match existing {
            Some(ex) => (
                ex.version + 1,
                ex.created_time,
                if write.rotation {
                    OpType::Rotate
                } else {
                    OpType::Update
                },
            ),
            None => (1, now, OpType::Insert),
        };

        let record = Self {
            key: write.key,
            data: write.data,
            is_encrypted: write.is_encrypted,
            category: write.category,
            version,
            is_active: true,
            updated_by: write.updated_by,
            sensitive_paths: write.sensitive_paths,
            created_time,
            modified_time: now,
        };
        (record, op_type)
    }

    /// Soft-deleted copy of this record
    pub fn deactivated(&self, updated_by: &str, now: i64) -> Self {
        Self {
            version: self.version + 1,
            is_active: false,
            updated_by: updated_by.to_string(),
            modified_time: now,
            ..self.clone()
        }
    }
}

impl ConfigHistoryStorageData {
    /// Snapshot a record for the audit trail
    pub fn snapshot(id: u64, record: &ConfigRecordStorageData, op_type: OpType) -> Self {
        Self {
            id,
            key: record.key.clone(),
            version: record.version,
            op_type,
            data: record.data.clone(),
            category: record.category,
            is_active: record.is_active,
            is_encrypted: record.is_encrypted,
            sensitive_paths: record.sensitive_paths.clone(),
            updated_by: record.updated_by.clone(),
            created_time: record.modified_time,
        }
    }
}

/// Strictly increasing history ids seeded from the wall clock (microseconds)
#[derive(Debug, Default)]
pub struct HistoryIdGenerator {
    last: AtomicU64,
}

impl HistoryIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }
}

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
