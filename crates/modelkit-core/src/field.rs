//! # Field
//!
//! Per-instance field state: the stored value, the raw value as last
//! written, and the fixed baseline used by `is_changed` and `rollback`.
//!
//! A field never emits model-level events by itself; the owning model
//! drives change tracking. Field-level listeners are kept in the field's
//! own emitter.

use crate::decl::{FieldDecl, FieldKind};
use crate::events::Emitter;
use crate::model::Model;
use crate::validation::InvalidRule;
use serde_json::{Number, Value};
use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// KIND SEMANTICS
// =============================================================================

impl FieldKind {
    /// Coerce a written value into the kind's storage form.
    ///
    /// `null` stays `null` for every kind. Values that cannot be coerced are
    /// stored as given; validation rules decide whether they are acceptable.
    #[must_use]
    pub fn normalize(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (Self::String, Value::Number(n)) => Value::String(n.to_string()),
            (Self::String, Value::Bool(b)) => Value::String(b.to_string()),
            (Self::Number, Value::String(s)) => parse_number(&s).unwrap_or(Value::String(s)),
            (Self::Boolean, Value::String(s)) => match s.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (Self::Boolean, Value::Number(n)) => {
                Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))
            }
            (_, other) => other,
        }
    }

    /// Emptiness as seen by `is_empty` and the `required` rule.
    #[must_use]
    pub fn is_empty_value(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Value::Null);
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

// =============================================================================
// FIELD
// =============================================================================

#[derive(Debug, Clone, Default)]
struct FieldState {
    raw: Value,
    value: Value,
    fixed: Value,
}

/// One field of one model instance.
#[derive(Debug)]
pub struct Field {
    name: String,
    decl: Rc<FieldDecl>,
    kind: FieldKind,
    state: RefCell<FieldState>,
    emitter: Emitter,
}

impl Field {
    /// Create an empty field for `decl`.
    #[must_use]
    pub fn new(name: impl Into<String>, decl: Rc<FieldDecl>) -> Self {
        let kind = decl.kind();
        Self {
            name: name.into(),
            decl,
            kind,
            state: RefCell::new(FieldState::default()),
            emitter: Emitter::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn decl(&self) -> &Rc<FieldDecl> {
        &self.decl
    }

    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Field-level listeners.
    #[must_use]
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Stored value.
    #[must_use]
    pub fn get(&self) -> Value {
        self.state.borrow().value.clone()
    }

    /// Value as last written, before preprocessing and normalization.
    #[must_use]
    pub fn raw(&self) -> Value {
        self.state.borrow().raw.clone()
    }

    /// Stored value passed through the declared formatter.
    #[must_use]
    pub fn format(&self) -> Value {
        let value = self.get();
        match self.decl.formatter() {
            Some(f) => f.apply(&value),
            None => value,
        }
    }

    /// The storage form `value` would take if written.
    #[must_use]
    pub fn prepare(&self, value: &Value) -> Value {
        let value = match self.decl.preprocessor() {
            Some(f) => f.apply(value),
            None => value.clone(),
        };
        self.kind.normalize(value)
    }

    /// Compare a candidate value with the stored one, after preparation.
    #[must_use]
    pub fn is_equal(&self, value: &Value) -> bool {
        let prepared = self.prepare(value);
        self.state.borrow().value == prepared
    }

    /// Store a value.
    pub fn set(&self, value: Value) {
        let prepared = self.prepare(&value);
        let mut state = self.state.borrow_mut();
        state.raw = value;
        state.value = prepared;
    }

    /// Store an initial value and make it the fixed baseline.
    pub fn init_data(&self, value: Value) {
        let prepared = self.prepare(&value);
        let mut state = self.state.borrow_mut();
        state.raw = value;
        state.fixed = prepared.clone();
        state.value = prepared;
    }

    /// The value `clear` resets this field to.
    #[must_use]
    pub fn cleared_value(&self) -> Value {
        self.decl.declared_default().unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty_value(&self.state.borrow().value)
    }

    /// Check the stored value against the fixed baseline.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        let state = self.state.borrow();
        state.value != state.fixed
    }

    /// Make the stored value the fixed baseline.
    pub fn fix_data(&self) {
        let mut state = self.state.borrow_mut();
        state.fixed = state.value.clone();
    }

    /// Restore the fixed baseline. Returns whether the stored value changed.
    pub fn rollback(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.value == state.fixed {
            return false;
        }
        state.value = state.fixed.clone();
        state.raw = state.fixed.clone();
        true
    }

    #[must_use]
    pub fn fixed_value(&self) -> Value {
        self.state.borrow().fixed.clone()
    }

    /// Run every declared rule against the stored value.
    ///
    /// # Errors
    ///
    /// Every failed rule, in declaration order.
    pub fn validate(&self, model: &Model) -> Result<(), Vec<InvalidRule>> {
        let value = self.get();
        let empty = self.kind.is_empty_value(&value);
        let failed: Vec<InvalidRule> = self
            .decl
            .rules()
            .iter()
            .filter_map(|rule| rule.check(&value, empty, model).err())
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(failed)
        }
    }

    /// Export form of the field.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.get()
    }

    /// Detach every field-level listener.
    pub fn destruct(&self) {
        self.emitter.off_all();
    }
}
