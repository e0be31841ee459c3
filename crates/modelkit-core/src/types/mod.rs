//! # Core Type Definitions
//!
//! This module contains the small value types shared by every component:
//! - Instance identifiers (`ModelId`)
//! - Listener context tokens (`ContextId`)
//! - Error types (`ModelError`)
//!
//! ## Error Policy
//!
//! Fatal conditions are programmer errors in schema definition and surface
//! as `Err(ModelError)`. Expected runtime outcomes (failed validation,
//! reading an unknown field, writing an equal value) are plain data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

// =============================================================================
// MODEL IDENTIFIER
// =============================================================================

/// Identifier of a model instance.
///
/// Unique among instances that share the same immediate parent path.
/// Numeric ids are kept in their decimal string form so they embed into
/// paths verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    /// Create a new id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id out of a field value.
    ///
    /// Strings and numbers are accepted. `null`, empty strings and
    /// structured values do not name an id.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// The id as a field value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for ModelId {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

macro_rules! model_id_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ModelId {
                fn from(n: $t) -> Self {
                    Self(n.to_string())
                }
            }
        )*
    };
}

model_id_from_int!(i32, i64, u32, u64, usize);

// =============================================================================
// LISTENER CONTEXT
// =============================================================================

/// Identity of the "calling context" a listener was registered with.
///
/// Closures capture their own state, so the context only participates in
/// listener identity: removing a listener requires the same handler AND the
/// same context it was added with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(pub u64);

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the modelkit system.
///
/// Every variant is fatal for the call that produced it. Schema errors name
/// the offending model so they can be traced back to the declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A declaration extends a type that was never declared.
    #[error("base model \"{base}\" for \"{model}\" is undefined")]
    UnknownBaseType { model: String, base: String },

    /// A `depends_from` entry names a field the type does not declare.
    #[error("in model \"{model}\" depended field \"{field}\" is not declared")]
    UndeclaredDependency { model: String, field: String },

    /// The `depends_from` relation contains a cycle.
    #[error("in model \"{model}\" circle fields dependence: {chain}")]
    CyclicDependency { model: String, chain: String },

    /// An operation referenced a type name with no declaration.
    #[error("model \"{0}\" is not declared")]
    UnknownModel(String),

    /// A field subscription referenced a field the type does not declare.
    #[error("model \"{model}\" has no field \"{field}\"")]
    UnknownField { model: String, field: String },

    /// A path pattern could not be compiled into a matcher.
    #[error("invalid path pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A schema or data file could not be parsed.
    #[error("schema error: {0}")]
    Schema(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_id_from_numbers_and_strings() {
        assert_eq!(ModelId::from(7), ModelId::new("7"));
        assert_eq!(ModelId::from(7u64).as_str(), "7");
        assert_eq!(ModelId::from("x").to_string(), "x");
    }

    #[test]
    fn model_id_from_value() {
        assert_eq!(ModelId::from_value(&json!("X")), Some(ModelId::new("X")));
        assert_eq!(ModelId::from_value(&json!(12)), Some(ModelId::new("12")));
        assert_eq!(ModelId::from_value(&json!("")), None);
        assert_eq!(ModelId::from_value(&Value::Null), None);
        assert_eq!(ModelId::from_value(&json!({"a": 1})), None);
    }

    #[test]
    fn cycle_error_names_model_and_chain() {
        let err = ModelError::CyclicDependency {
            model: "order".to_string(),
            chain: "a -> b -> a".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("order"));
        assert!(msg.contains("a -> b -> a"));
    }
}
