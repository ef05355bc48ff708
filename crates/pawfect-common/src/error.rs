//! Error types and error codes for the configuration store
//!
//! This module defines:
//! - `ConfigError`: the error taxonomy shared by every layer
//! - `ErrorCode`: structured error codes for an HTTP boundary

use serde::{Deserialize, Serialize};

/// Generic decryption failure text. Every decryption-side rejection renders
/// this message so callers cannot tell which check failed.
pub const DECRYPTION_FAILED_MESSAGE: &str =
    "Decryption failed: data may be corrupted or tampered with";

/// Errors raised by the encryptor, the config store and the resolver
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("encryption key for version {version} is not configured")]
    KeyMaterialMissing { version: u8 },

    #[error("{}", DECRYPTION_FAILED_MESSAGE)]
    UnsupportedFormatVersion(u8),

    #[error("{}", DECRYPTION_FAILED_MESSAGE)]
    AuthenticationFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid value for '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("configuration '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Result alias used across the workspace
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that signal corruption, tampering or a missing key.
    /// These are never retried or replaced by a fallback.
    pub fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            ConfigError::KeyMaterialMissing { .. }
                | ConfigError::UnsupportedFormatVersion(_)
                | ConfigError::AuthenticationFailed
        )
    }

    /// Field name carried by a validation failure
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::ValidationFailed { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            ConfigError::KeyMaterialMissing { .. } => KEY_MATERIAL_MISSING,
            ConfigError::UnsupportedFormatVersion(_) | ConfigError::AuthenticationFailed => {
                DECRYPTION_FAILED
            }
            ConfigError::EncryptionFailed(_) => ENCRYPTION_FAILED,
            ConfigError::ValidationFailed { .. } => PARAMETER_VALIDATE_ERROR,
            ConfigError::NotFound(_) => RESOURCE_NOT_FOUND,
            ConfigError::Storage(_) => DATA_ACCESS_ERROR,
        }
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const KEY_MATERIAL_MISSING: ErrorCode<'static> = ErrorCode {
    code: 30001,
    message: "encryption key not configured",
};

pub const ENCRYPTION_FAILED: ErrorCode<'static> = ErrorCode {
    code: 30002,
    message: "encryption failed",
};

pub const DECRYPTION_FAILED: ErrorCode<'static> = ErrorCode {
    code: 30003,
    message: DECRYPTION_FAILED_MESSAGE,
};
