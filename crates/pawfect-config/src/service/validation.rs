//! Input validation for configuration writes
//!
//! Field validators return `validator::ValidationError`; the store converts
//! them into `ConfigError::ValidationFailed` carrying the field path.

use std::borrow::Cow;

use serde_json::{Value, json};
use tracing::warn;
use validator::{ValidateEmail, ValidateUrl, ValidationError};

use pawfect_common::{ConfigError, ConfigResult, SENSITIVE_SENTINEL, is_valid, is_valid_key};
use pawfect_persistence::Category;

use crate::model::path;
use crate::model::{FieldKind, FieldSpec, SubsystemSchema};

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn into_config_error(field: &str, err: ValidationError) -> ConfigError {
    let reason = err
        .message
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string());
    ConfigError::validation(field, reason)
}

fn is_email(value: &str) -> bool {
    value.to_string().validate_email()
}

fn is_url(value: &str) -> bool {
    value.to_string().validate_url()
}

/// Validate a configuration key
pub fn validate_key(key: &str) -> ConfigResult<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(ConfigError::validation(
            "key",
            "must be 1-128 characters of letters, digits, '_', '.', ':' or '-'",
        ))
    }
}

/// Validate a dotted sensitive path
pub fn validate_sensitive_path(path: &str) -> ConfigResult<()> {
    let well_formed = !path.is_empty()
        && path
            .split('.')
            .all(|segment| !segment.is_empty() && is_valid(segment));
    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::validation(
            "sensitivePaths",
            format!("'{}' is not a valid dotted path", path),
        ))
    }
}

/// Parse a category name, rejecting unknown values
pub fn parse_category(name: &str) -> ConfigResult<Category> {
    name.parse::<Category>()
        .map_err(|_| ConfigError::validation("category", format!("unknown category '{}'", name)))
}

/// Validate one present value against its field spec
pub fn validate_field(spec: &FieldSpec, value: &Value) -> Result<(), ValidationError> {
    if value.is_null() {
        return Ok(());
    }
    if spec.sensitive && value.as_str() == Some(SENSITIVE_SENTINEL) {
        return Ok(());
    }

    match &spec.kind {
        FieldKind::Text => {
            let text = value
                .as_str()
                .ok_or_else(|| error("not_a_string", "expected a string"))?;
            if spec.required && text.trim().is_empty() {
                return Err(error("empty", "must not be empty"));
            }
        }
        FieldKind::Port => {
            let port = value
                .as_i64()
                .ok_or_else(|| error("not_an_integer", "expected an integer port"))?;
            if !(1..=65535).contains(&port) {
                return Err(error(
                    "port_out_of_range",
                    format!("port {} must be between 1 and 65535", port),
                ));
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                return Err(error("not_a_boolean", "expected true or false"));
            }
        }
        FieldKind::Integer { min, max } => {
            let n = value
                .as_i64()
                .ok_or_else(|| error("not_an_integer", "expected an integer"))?;
            if n < *min || n > *max {
                return Err(error(
                    "out_of_range",
                    format!("{} must be between {} and {}", n, min, max),
                ));
            }
        }
        FieldKind::Email => {
            let text = value
                .as_str()
                .ok_or_else(|| error("not_a_string", "expected an email address"))?;
            if text.is_empty() {
                if spec.required {
                    return Err(error("empty", "must not be empty"));
                }
            } else if !is_email(text) {
                return Err(error(
                    "invalid_email",
                    format!("'{}' is not a valid email address", text),
                ));
            }
        }
        FieldKind::Url => {
            let text = value
                .as_str()
                .ok_or_else(|| error("not_a_string", "expected a URL"))?;
            if text.is_empty() {
                if spec.required {
                    return Err(error("empty", "must not be empty"));
                }
            } else if !is_url(text) {
                return Err(error("invalid_url", format!("'{}' is not a valid URL", text)));
            }
        }
        FieldKind::EmailList => {
            let items = value
                .as_array()
                .ok_or_else(|| error("not_a_list", "expected a list of email addresses"))?;
            for item in items {
                match item.as_str() {
                    Some(text) if is_email(text) => {}
                    _ => {
                        return Err(error(
                            "invalid_email",
                            format!("{} is not a valid email address", item),
                        ));
                    }
                }
            }
            if spec.required && items.is_empty() {
                return Err(error("empty", "must not be empty"));
            }
        }
    }
    Ok(())
}

/// Validate a whole document before it is written
///
/// The document must be a JSON object. Present schema fields are checked
/// against their specs; values at sensitive paths must be strings.
pub fn validate_document(
    schema: Option<&SubsystemSchema>,
    data: &Value,
    sensitive_paths: &[String],
) -> ConfigResult<()> {
    if !data.is_object() {
        return Err(ConfigError::validation("data", "must be a JSON object"));
    }

    if let Some(schema) = schema {
        for spec in &schema.fields {
            if let Some(value) = path::get(data, &spec.path) {
                validate_field(spec, value).map_err(|e| into_config_error(&spec.path, e))?;
            }
        }
    }

    for sensitive in sensitive_paths {
        validate_sensitive_path(sensitive)?;
        match path::get(data, sensitive) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ConfigError::validation(
                    sensitive.as_str(),
                    "sensitive values must be strings",
                ));
            }
        }
    }
    Ok(())
}

/// Parse an environment variable value for a field
///
/// Returns `None` for empty values and for values that do not parse, so the
/// caller falls through to the default.
pub fn parse_env_value(spec: &FieldSpec, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = match &spec.kind {
        FieldKind::Text | FieldKind::Email | FieldKind::Url => Some(json!(raw)),
        FieldKind::Port | FieldKind::Integer { .. } => raw.parse::<i64>().ok().map(|n| json!(n)),
        FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(json!(true)),
            "false" | "0" | "no" | "off" => Some(json!(false)),
            _ => None,
        },
        FieldKind::EmailList => Some(json!(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        )),
    };

    // Environment values go through the same rules as persisted ones
    match parsed {
        Some(value) if validate_field(spec, &value).is_ok() => Some(value),
        _ => {
            warn!(
                field = %spec.path,
                env_var = spec.env_var.as_deref().unwrap_or(""),
                "Ignoring invalid environment value"
            );
            None
        }
    }
}
