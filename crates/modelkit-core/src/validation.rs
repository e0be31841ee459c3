//! # Validation
//!
//! Field validation rules and the result of validating a model.
//!
//! Every rule except [`Rule::Required`] accepts an empty value, so optional
//! fields only need `Required` to become mandatory.

use crate::model::Model;
use crate::types::ModelError;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Signature of a custom rule: value under test and the owning model.
pub type CustomCheck = dyn Fn(&Value, &Model) -> bool;

/// A validation rule attached to a field.
#[derive(Clone)]
pub enum Rule {
    /// The value must not be empty.
    Required,
    /// Numeric lower bound, inclusive.
    Min(f64),
    /// Numeric upper bound, inclusive.
    Max(f64),
    /// Minimum length of a string (in chars) or an array.
    MinLength(usize),
    /// Maximum length of a string (in chars) or an array.
    MaxLength(usize),
    /// The string form of the value must match.
    Pattern(Regex),
    /// Caller-provided check.
    Custom { name: String, check: Rc<CustomCheck> },
}

impl Rule {
    /// Build a pattern rule.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` when `pattern` is not a valid regular expression.
    pub fn pattern(pattern: &str) -> Result<Self, ModelError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| ModelError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Build a custom rule.
    pub fn custom(name: impl Into<String>, check: impl Fn(&Value, &Model) -> bool + 'static) -> Self {
        Self::Custom {
            name: name.into(),
            check: Rc::new(check),
        }
    }

    /// Rule name as reported in [`InvalidRule`].
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::Pattern(_) => "pattern",
            Self::Custom { name, .. } => name,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Required => "value is required".to_string(),
            Self::Min(min) => format!("value must be at least {min}"),
            Self::Max(max) => format!("value must be at most {max}"),
            Self::MinLength(len) => format!("length must be at least {len}"),
            Self::MaxLength(len) => format!("length must be at most {len}"),
            Self::Pattern(re) => format!("value must match {}", re.as_str()),
            Self::Custom { name, .. } => format!("check \"{name}\" failed"),
        }
    }

    /// Run the rule. `is_empty` is the field kind's emptiness of `value`.
    pub(crate) fn check(&self, value: &Value, is_empty: bool, model: &Model) -> Result<(), InvalidRule> {
        let passed = match self {
            Self::Required => !is_empty,
            _ if is_empty => true,
            Self::Min(min) => value.as_f64().is_none_or(|v| v >= *min),
            Self::Max(max) => value.as_f64().is_none_or(|v| v <= *max),
            Self::MinLength(len) => length_of(value).is_none_or(|l| l >= *len),
            Self::MaxLength(len) => length_of(value).is_none_or(|l| l <= *len),
            Self::Pattern(re) => re.is_match(&text_of(value)),
            Self::Custom { check, .. } => check(value, model),
        };
        if passed {
            Ok(())
        } else {
            Err(InvalidRule {
                rule: self.name().to_string(),
                message: self.message(),
            })
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::Min(v) => f.debug_tuple("Min").field(v).finish(),
            Self::Max(v) => f.debug_tuple("Max").field(v).finish(),
            Self::MinLength(v) => f.debug_tuple("MinLength").field(v).finish(),
            Self::MaxLength(v) => f.debug_tuple("MaxLength").field(v).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidRule {
    pub rule: String,
    pub message: String,
}

/// Outcome of `Model::validate`.
///
/// Validating one field fills `field`, `error_fields` and `errors`.
/// Validating the whole model also fills `errors_data`, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<InvalidRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors_data: Option<IndexMap<String, Vec<InvalidRule>>>,
    pub valid: bool,
}

impl ValidationResult {
    /// The result as an event payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
