//! PawfectMatch Persistence - Storage layer for configuration records
//!
//! This crate provides:
//! - Persistence trait abstractions for configuration storage
//! - Domain model types for persistence operations
//! - An in-memory backend and an embedded RocksDB backend

pub mod embedded;
pub mod memory;
pub mod model;
pub mod traits;

// Re-export persistence traits
pub use traits::{ConfigPersistence, PersistenceService};

// Re-export backends
pub use embedded::EmbeddedPersistService;
pub use memory::MemoryPersistService;

// Re-export model types
pub use model::{
    Category, ConfigHistoryStorageData, ConfigRecordStorageData, ConfigWrite, OpType,
    StorageMode,
};
