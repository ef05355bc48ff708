//! PawfectMatch Config - secret-bearing configuration store
//!
//! This crate provides:
//! - Subsystem schemas with sensitive field declarations
//! - Validated, versioned writes with sealed secrets
//! - Masked reads and audit history
//! - Effective settings resolution with environment fallback
//! - Key rotation sweeps

pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::*;
pub use service::*;
