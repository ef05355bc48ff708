//! PawfectMatch Common - Shared types, traits, and utilities
//!
//! This crate provides the foundational pieces used by every PawfectMatch
//! configuration component:
//! - Configuration secret encryption (sealed envelopes, key providers)
//! - Error types and error codes
//! - Environment access traits for dependency injection
//! - Key validation helpers

pub mod crypto;
pub mod error;
pub mod traits;
pub mod utils;

// Re-exports for convenience
pub use crypto::{Encryptor, KeyProvider, SealInfo};
pub use error::{ConfigError, ConfigResult, ErrorCode};
pub use traits::*;
pub use utils::{is_valid, is_valid_key, looks_sensitive};

/// Display placeholder returned instead of a configured secret.
///
/// Submitting it back through a write keeps the stored value unchanged.
pub const SENSITIVE_SENTINEL: &str = "***configured***";

/// Actor recorded for writes that do not name one
pub const SYSTEM_ACTOR: &str = "system";
