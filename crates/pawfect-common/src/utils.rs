//! Utility functions shared by the store and the resolver

use std::sync::LazyLock;

/// Maximum length for a configuration key
pub const MAX_KEY_LENGTH: usize = 128;

/// Regex pattern for validating configuration keys
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]*$").expect("Invalid regex pattern"));

/// Name fragments that usually indicate a secret
const SENSITIVE_NAME_FRAGMENTS: &[&str] = &["secret", "key", "token", "password", "credential"];

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen
///
/// # Examples
///
/// ```
/// use pawfect_common::is_valid;
///
/// assert!(is_valid("analytics"));
/// assert!(is_valid("stripe:live"));
/// assert!(!is_valid("invalid/path"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Validate a configuration key: non-empty, bounded, allowed characters only
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LENGTH && is_valid(key)
}

/// Whether a field name looks like it holds a secret.
///
/// Advisory only. Sealing is driven by declared sensitive paths, this is used
/// to warn when a secret-looking field is stored outside of them.
pub fn looks_sensitive(field_name: &str) -> bool {
    let lower = field_name.to_ascii_lowercase();
    SENSITIVE_NAME_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}
