//! Configuration service layer
//!
//! - `ConfigStore`: validated, sealed, versioned writes and masked reads
//! - `ConfigService`: effective settings with environment and default fallback
//! - `KeyRotationService`: audit and re-seal stored secrets under a new key

pub mod resolver;
pub mod rotation;
pub mod store;
pub mod validation;

pub use resolver::{ConfigService, EMAIL_SUBSYSTEM, ResolvedConfig, ValueSource};
pub use rotation::{KeyRotationService, RotationFailure, RotationReport, SealAudit};
pub use store::{ConfigStore, DEFAULT_HISTORY_LIMIT, mask};
