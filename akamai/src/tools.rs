//! Typed access to resource config and state fields
//!
//! The getters follow "get if set" semantics: a value that is absent, null,
//! unknown or the zero value of its type is reported as [`ToolsError::NotFound`],
//! so callers can tell "not configured" apart from a real problem.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolsError {
    #[error("provided key cannot be empty")]
    EmptyKey,

    #[error("value not found: {0}")]
    NotFound(String),

    #[error("value must be of the specified type: {key}, \"{expected}\"")]
    InvalidType { key: String, expected: &'static str },

    #[error("setting property value: {key}: {message}")]
    ValueSet { key: String, message: String },

    #[error("invalid date {0:?}")]
    InvalidDate(String),
}

impl ToolsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ToolsError::NotFound(_))
    }
}

impl From<ToolsError> for Diagnostic {
    fn from(err: ToolsError) -> Self {
        let diagnostic = Diagnostic::error("Invalid attribute value", err.to_string());
        match &err {
            ToolsError::NotFound(key)
            | ToolsError::InvalidType { key, .. }
            | ToolsError::ValueSet { key, .. } => diagnostic.with_attribute(AttributePath::new(key)),
            _ => diagnostic,
        }
    }
}

/// Drops NotFound, keeping every other error
pub trait OptionalValue<T> {
    fn optional(self) -> Result<Option<T>, ToolsError>;
}

impl<T> OptionalValue<T> for Result<T, ToolsError> {
    fn optional(self) -> Result<Option<T>, ToolsError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(ToolsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn lookup<'a>(key: &str, data: &'a DynamicValue) -> Result<&'a Dynamic, ToolsError> {
    if key.is_empty() {
        return Err(ToolsError::EmptyKey);
    }
    match data.get(&AttributePath::new(key)) {
        None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => {
            Err(ToolsError::NotFound(key.to_string()))
        }
        Some(value) => Ok(value),
    }
}

pub fn get_string_value(key: &str, data: &DynamicValue) -> Result<String, ToolsError> {
    match lookup(key, data)? {
        Dynamic::String(s) if s.is_empty() => Err(ToolsError::NotFound(key.to_string())),
        Dynamic::String(s) => Ok(s.clone()),
        _ => Err(ToolsError::InvalidType {
            key: key.to_string(),
            expected: "string",
        }),
    }
}

pub fn get_int_value(key: &str, data: &DynamicValue) -> Result<i64, ToolsError> {
    match lookup(key, data)? {
        Dynamic::Number(n) if n.fract() != 0.0 => Err(ToolsError::InvalidType {
            key: key.to_string(),
            expected: "int",
        }),
        Dynamic::Number(n) if *n == 0.0 => Err(ToolsError::NotFound(key.to_string())),
        Dynamic::Number(n) => Ok(*n as i64),
        _ => Err(ToolsError::InvalidType {
            key: key.to_string(),
            expected: "int",
        }),
    }
}

pub fn get_bool_value(key: &str, data: &DynamicValue) -> Result<bool, ToolsError> {
    match lookup(key, data)? {
        Dynamic::Bool(false) => Err(ToolsError::NotFound(key.to_string())),
        Dynamic::Bool(b) => Ok(*b),
        _ => Err(ToolsError::InvalidType {
            key: key.to_string(),
            expected: "bool",
        }),
    }
}

/// Set of strings; unknown elements are skipped
pub fn get_set_value(key: &str, data: &DynamicValue) -> Result<Vec<String>, ToolsError> {
    match lookup(key, data)? {
        Dynamic::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Dynamic::String(s) => values.push(s.clone()),
                    Dynamic::Unknown | Dynamic::Null => {}
                    _ => {
                        return Err(ToolsError::InvalidType {
                            key: key.to_string(),
                            expected: "set of string",
                        })
                    }
                }
            }
            if values.is_empty() {
                Err(ToolsError::NotFound(key.to_string()))
            } else {
                Ok(values)
            }
        }
        _ => Err(ToolsError::InvalidType {
            key: key.to_string(),
            expected: "set of string",
        }),
    }
}

/// Writes a top-level attribute
pub fn set_value(state: &mut DynamicValue, key: &str, value: Dynamic) -> Result<(), ToolsError> {
    if key.is_empty() {
        return Err(ToolsError::EmptyKey);
    }
    state
        .set(&AttributePath::new(key), value)
        .map_err(|e| ToolsError::ValueSet {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Replaces every unknown top-level attribute with null
///
/// Used before handing back state from an apply that stopped early, since
/// Terraform rejects unknown values in new state.
pub fn unknowns_to_null(state: &mut DynamicValue) {
    if let Dynamic::Map(map) = &mut state.value {
        for value in map.values_mut() {
            if value.is_unknown() {
                *value = Dynamic::Null;
            }
        }
    }
}

/// `"123"` -> `"prp_123"`; already prefixed values are returned unchanged
pub fn add_prefix(value: &str, prefix: &str) -> String {
    if value.starts_with(prefix) {
        value.to_string()
    } else {
        format!("{}{}", prefix, value)
    }
}

pub fn max_duration(a: Duration, b: Duration) -> Duration {
    a.max(b)
}

/// Parses API timestamps such as `2020-10-28T15:04:05Z`
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, ToolsError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| ToolsError::InvalidDate(value.to_string()))
}
