//! # Model Instance
//!
//! A live instance of a declared type: fields, change tracking, dependent
//! recalculation and per-instance events.
//!
//! ## Change Tracking
//!
//! Every non-initializing write that changes a stored value records the
//! field in the pending change list and fires `field-change` on the model
//! (and `change` on the field). Writes are batched: nested writes, dependent
//! recalculation, `update`, `rollback`, `clear` and [`Model::batch`] all
//! flush the pending list in exactly one model-level `change` event when the
//! outermost write returns.
//!
//! ## Initialization
//!
//! Initializing writes (`SetOptions::init`) update the fixed baseline, fire
//! `field-init` and recalculate dependents through the initializing path
//! too, so constructing an instance never reports changes.
//!
//! ## Re-entrancy
//!
//! No borrow of instance state is held while a listener, a calculation or a
//! behavior hook runs. Listeners may read, write, subscribe or destroy.

use crate::decl::{CalcInput, CompiledType, FieldKind};
use crate::events::{Emitter, Event, Handler, split_names};
use crate::field::Field;
use crate::primitives::{
    EVENT_CHANGE, EVENT_CLEAR, EVENT_ERROR, EVENT_FIELD_CHANGE, EVENT_FIELD_INIT, EVENT_FIX,
    EVENT_ROLLBACK, EVENT_UPDATE, EVENT_VALIDATED,
};
use crate::registry::{ModelRegistry, RegistryShared};
use crate::types::{ContextId, ModelId};
use crate::validation::ValidationResult;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

// =============================================================================
// OPTIONS
// =============================================================================

/// Options accompanying a write or a lifecycle operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Initializing write: no change tracking, fixed baseline updated.
    pub is_init: bool,
    /// Caller payload merged into the data of every event the operation
    /// fires. Objects are merged key by key; anything else lands under `data`.
    pub data: Value,
}

impl SetOptions {
    /// Options for an initializing write.
    #[must_use]
    pub fn init() -> Self {
        Self {
            is_init: true,
            data: Value::Null,
        }
    }

    /// Options carrying a caller payload.
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self {
            is_init: false,
            data,
        }
    }

    pub(crate) fn payload<const N: usize>(&self, extra: [(&str, Value); N]) -> Value {
        let mut map = match &self.data {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };
        for (key, value) in extra {
            map.insert(key.to_string(), value);
        }
        Value::Object(map)
    }
}

/// Which representation `Model::get_as` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GetMode {
    /// Stored (normalized) value.
    #[default]
    Get,
    /// Value as last written.
    Raw,
    /// Stored value through the declared formatter.
    Formatted,
}

// =============================================================================
// MODEL
// =============================================================================

struct ModelInner {
    name: String,
    id: ModelId,
    path: String,
    decl: Rc<CompiledType>,
    fields: IndexMap<String, Field>,
    changed: RefCell<Vec<String>>,
    batch_depth: Cell<usize>,
    emitter: Emitter,
    registry: Weak<RegistryShared>,
}

/// Handle to a model instance.
///
/// Cloning the handle shares the instance.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

/// Increments the batch depth for its lifetime.
struct BatchGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> BatchGuard<'a> {
    fn enter(model: &'a Model) -> Self {
        let depth = &model.inner.batch_depth;
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl Model {
    /// Build and initialize an instance. Registration is the caller's job.
    pub(crate) fn construct(
        decl: Rc<CompiledType>,
        id: ModelId,
        path: String,
        data: &Value,
        registry: Weak<RegistryShared>,
    ) -> Self {
        let fields = decl
            .fields()
            .iter()
            .map(|(name, field_decl)| (name.clone(), Field::new(name, Rc::clone(field_decl))))
            .collect();

        let model = Self {
            inner: Rc::new(ModelInner {
                name: decl.name().to_string(),
                id,
                path,
                decl: Rc::clone(&decl),
                fields,
                changed: RefCell::new(Vec::new()),
                batch_depth: Cell::new(0),
                emitter: Emitter::new(),
                registry,
            }),
        };

        let init = SetOptions::init();
        for (name, field_decl) in decl.fields() {
            if field_decl.is_calculated() {
                continue;
            }
            let value = data
                .get(name)
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| field_decl.initial_value())
                .unwrap_or(Value::Null);
            model.init_field(name, value, &init);
        }

        let behavior = Rc::clone(decl.behavior());
        behavior.init(&model);
        model
    }

    // -------------------------------------------------------------------------
    // identity
    // -------------------------------------------------------------------------

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn id(&self) -> &ModelId {
        &self.inner.id
    }

    /// Canonical path, fixed at creation.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// The compiled declaration this instance was built from.
    #[must_use]
    pub fn declaration(&self) -> &Rc<CompiledType> {
        &self.inner.decl
    }

    /// Check whether two handles point at the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------------
    // field access
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.inner.fields.contains_key(name)
    }

    /// The field collaborator for `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.inner.fields.get(name)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.inner.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|f| f.kind().clone())
    }

    /// Read a field's stored value. `None` for an unknown field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_as(name, GetMode::Get)
    }

    /// Read a field in the given representation.
    ///
    /// A calculated field without antecedents is recomputed on every read,
    /// whatever the mode.
    #[must_use]
    pub fn get_as(&self, name: &str, mode: GetMode) -> Option<Value> {
        let field = self.field(name)?;
        let decl = Rc::clone(field.decl());
        if let Some(calc) = decl.calculation_fn() {
            if decl.antecedents().is_empty() {
                return Some(calc.call(self, CalcInput::None));
            }
        }
        Some(match mode {
            GetMode::Get => field.get(),
            GetMode::Raw => field.raw(),
            GetMode::Formatted => field.format(),
        })
    }

    fn value_of(&self, name: &str) -> Value {
        self.field(name).map(Field::get).unwrap_or(Value::Null)
    }

    // -------------------------------------------------------------------------
    // writes
    // -------------------------------------------------------------------------

    /// Write a field. Returns whether the stored value changed.
    ///
    /// Unknown fields and values equal to the stored one (after
    /// preprocessing and normalization) are silent no-ops.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        self.set_with(name, value, &SetOptions::default())
    }

    /// Write a field with options.
    pub fn set_with(&self, name: &str, value: impl Into<Value>, opts: &SetOptions) -> bool {
        let value = value.into();
        let Some(field) = self.field(name) else {
            return false;
        };
        if field.is_equal(&value) {
            return false;
        }
        if opts.is_init {
            field.init_data(value.clone());
            self.field_initialized(name, value, opts);
        } else {
            field.set(value.clone());
            self.field_changed(name, value, opts);
        }
        true
    }

    /// Initializing write without the equality check, so every field fires
    /// `field-init` and computes its dependents even when its initial value
    /// is `null`.
    fn init_field(&self, name: &str, value: Value, opts: &SetOptions) {
        let Some(field) = self.field(name) else {
            return;
        };
        field.init_data(value.clone());
        self.field_initialized(name, value, opts);
    }

    fn field_initialized(&self, name: &str, value: Value, opts: &SetOptions) {
        if !self.is_calculated(name) {
            self.recalculate_dependents(name, opts);
        }
        let payload = opts.payload([("field", Value::from(name)), ("value", value)]);
        self.emit(EVENT_FIELD_INIT, &payload);
    }

    fn field_changed(&self, name: &str, value: Value, opts: &SetOptions) {
        let payload = opts.payload([("field", Value::from(name)), ("value", value)]);
        {
            let _batch = BatchGuard::enter(self);
            {
                let mut changed = self.inner.changed.borrow_mut();
                if !changed.iter().any(|c| c == name) {
                    changed.push(name.to_string());
                }
            }
            if !self.is_calculated(name) {
                self.recalculate_dependents(name, opts);
            }
            self.emit_field(name, EVENT_CHANGE, &payload);
            self.emit(EVENT_FIELD_CHANGE, &payload);
        }
        self.flush_changes(opts);
    }

    fn is_calculated(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.decl().is_calculated())
    }

    /// Recompute every dependent of `name`, antecedents first.
    fn recalculate_dependents(&self, name: &str, opts: &SetOptions) {
        let decl = Rc::clone(&self.inner.decl);
        let Some(source) = decl.field(name) else {
            return;
        };
        for dependent in source.dependents() {
            let Some(dependent_decl) = decl.field(dependent) else {
                continue;
            };
            let Some(calc) = dependent_decl.calculation_fn() else {
                continue;
            };
            let input = match dependent_decl.antecedents() {
                [] => continue,
                [single] => CalcInput::Single(self.value_of(single)),
                many => CalcInput::Many(
                    many.iter()
                        .map(|n| (n.clone(), self.value_of(n)))
                        .collect(),
                ),
            };
            let value = calc.call(self, input);
            self.set_with(dependent, value, opts);
        }
    }

    /// Reset one field, or every non-id, non-calculated field, to its
    /// default (or `null`), then fire `clear`.
    pub fn clear(&self, name: Option<&str>) {
        self.clear_with(name, &SetOptions::default());
    }

    pub fn clear_with(&self, name: Option<&str>, opts: &SetOptions) {
        match name {
            Some(name) => {
                if let Some(field) = self.field(name) {
                    self.set_with(name, field.cleared_value(), opts);
                }
            }
            None => self.batch_with(opts, |model| {
                for (name, field) in &model.inner.fields {
                    if *field.kind() == FieldKind::Id || field.decl().is_calculated() {
                        continue;
                    }
                    model.set_with(name, field.cleared_value(), opts);
                }
            }),
        }
        self.emit(EVENT_CLEAR, &opts.payload([]));
    }

    /// Write every entry of an object, then fire `update`.
    ///
    /// All writes are reported in one `change` event. Non-object data writes
    /// nothing.
    pub fn update(&self, data: &Value) {
        self.update_with(data, &SetOptions::default());
    }

    pub fn update_with(&self, data: &Value, opts: &SetOptions) {
        if let Value::Object(entries) = data {
            self.batch_with(opts, |model| {
                for (name, value) in entries {
                    model.set_with(name, value.clone(), opts);
                }
            });
        }
        self.emit(EVENT_UPDATE, &opts.payload([]));
    }

    /// Run `f` with change reporting deferred: every write inside is
    /// reported in one `change` event after `f` returns.
    pub fn batch<R>(&self, f: impl FnOnce(&Model) -> R) -> R {
        self.batch_with(&SetOptions::default(), f)
    }

    fn batch_with<R>(&self, opts: &SetOptions, f: impl FnOnce(&Model) -> R) -> R {
        let result = {
            let _batch = BatchGuard::enter(self);
            f(self)
        };
        self.flush_changes(opts);
        result
    }

    fn flush_changes(&self, opts: &SetOptions) {
        if self.inner.batch_depth.get() > 0 || self.inner.changed.borrow().is_empty() {
            return;
        }
        self.emit_change_with(opts);
    }

    /// Fire `change` with the pending change list, then clear the list.
    pub fn emit_change(&self) {
        self.emit_change_with(&SetOptions::default());
    }

    fn emit_change_with(&self, opts: &SetOptions) {
        let changed = std::mem::take(&mut *self.inner.changed.borrow_mut());
        let payload = opts.payload([(
            "changedFields",
            Value::Array(changed.into_iter().map(Value::String).collect()),
        )]);
        self.emit(EVENT_CHANGE, &payload);
    }

    /// Field names written since the last `change` event.
    #[must_use]
    pub fn pending_changes(&self) -> Vec<String> {
        self.inner.changed.borrow().clone()
    }

    // -------------------------------------------------------------------------
    // baseline
    // -------------------------------------------------------------------------

    /// Make the current values the fixed baseline, then fire `fix`.
    pub fn fix(&self) {
        self.fix_with(&SetOptions::default());
    }

    pub fn fix_with(&self, opts: &SetOptions) {
        for field in self.inner.fields.values() {
            field.fix_data();
        }
        self.emit(EVENT_FIX, &opts.payload([]));
    }

    /// Restore one field, or every field, to the fixed baseline, then fire
    /// `rollback`. Restored values are reported as changes.
    pub fn rollback(&self, name: Option<&str>) {
        self.rollback_with(name, &SetOptions::default());
    }

    pub fn rollback_with(&self, name: Option<&str>, opts: &SetOptions) {
        match name {
            Some(name) => self.restore(name, opts),
            None => self.batch_with(opts, |model| {
                for name in model.inner.fields.keys() {
                    model.restore(name, opts);
                }
            }),
        }
        self.emit(EVENT_ROLLBACK, &opts.payload([]));
    }

    fn restore(&self, name: &str, opts: &SetOptions) {
        let Some(field) = self.field(name) else {
            return;
        };
        if field.rollback() {
            self.field_changed(name, field.get(), opts);
        }
    }

    /// Fixed baseline of every field.
    #[must_use]
    pub fn fixed_values(&self) -> Value {
        Value::Object(
            self.inner
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), field.fixed_value()))
                .collect(),
        )
    }

    // -------------------------------------------------------------------------
    // state queries
    // -------------------------------------------------------------------------

    /// Emptiness of one field, or of every field. An unknown field counts
    /// as empty.
    #[must_use]
    pub fn is_empty(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.field(name).is_none_or(Field::is_empty),
            None => self.inner.fields.values().all(Field::is_empty),
        }
    }

    /// Whether one field, or any field, differs from the fixed baseline.
    #[must_use]
    pub fn is_changed(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.field(name).is_some_and(Field::is_changed),
            None => self.inner.fields.values().any(Field::is_changed),
        }
    }

    /// Field-wise equality with another instance.
    #[must_use]
    pub fn is_equal(&self, other: &Model) -> bool {
        if self.inner.fields.len() != other.inner.fields.len() {
            return false;
        }
        self.inner.fields.iter().all(|(name, field)| {
            other
                .get(name)
                .is_some_and(|value| self.field_equals(name, field, &value))
        })
    }

    /// Compare a candidate with the field's observable value. A calculated
    /// field without antecedents stores nothing, so its live value is used.
    fn field_equals(&self, name: &str, field: &Field, candidate: &Value) -> bool {
        let decl = field.decl();
        if decl.is_calculated() && decl.antecedents().is_empty() {
            return self
                .get(name)
                .is_some_and(|own| field.prepare(&own) == field.prepare(candidate));
        }
        field.is_equal(candidate)
    }

    /// Field-wise equality with a value bag. A missing field is unequal.
    #[must_use]
    pub fn is_equal_data(&self, data: &Value) -> bool {
        let Value::Object(entries) = data else {
            return false;
        };
        if self.inner.fields.len() != entries.len() {
            return false;
        }
        self.inner.fields.iter().all(|(name, field)| {
            entries
                .get(name)
                .is_some_and(|value| self.field_equals(name, field, value))
        })
    }

    // -------------------------------------------------------------------------
    // validation
    // -------------------------------------------------------------------------

    /// Validate one field or the whole instance.
    ///
    /// Fires `error` when a rule failed, then `validated` in every case.
    pub fn validate(&self, name: Option<&str>) -> ValidationResult {
        let mut result = ValidationResult::default();
        match name {
            Some(name) => {
                result.field = Some(name.to_string());
                if let Some(Err(failed)) = self.field(name).map(|f| f.validate(self)) {
                    result.error_fields = Some(vec![name.to_string()]);
                    result.errors = Some(failed);
                }
            }
            None => {
                let mut error_fields = Vec::new();
                let mut errors = Vec::new();
                let mut errors_data = IndexMap::new();
                for (name, field) in &self.inner.fields {
                    if let Err(failed) = field.validate(self) {
                        error_fields.push(name.clone());
                        errors.extend(failed.iter().cloned());
                        errors_data.insert(name.clone(), failed);
                    }
                }
                if !error_fields.is_empty() {
                    result.error_fields = Some(error_fields);
                    result.errors = Some(errors);
                    result.errors_data = Some(errors_data);
                }
            }
        }

        result.valid = result.errors.is_none();
        let payload = result.to_value();
        if !result.valid {
            tracing::debug!(model = self.path(), "validation failed");
            self.emit(EVENT_ERROR, &payload);
        }
        self.emit(EVENT_VALIDATED, &payload);
        result
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate(None).valid
    }

    // -------------------------------------------------------------------------
    // export
    // -------------------------------------------------------------------------

    /// Export through the type's behavior, falling back to
    /// [`Model::default_json`].
    #[must_use]
    pub fn to_json(&self) -> Value {
        let behavior = Rc::clone(self.inner.decl.behavior());
        behavior.to_json(self).unwrap_or_else(|| self.default_json())
    }

    /// Every non-internal field by name.
    #[must_use]
    pub fn default_json(&self) -> Value {
        let mut out = Map::new();
        for (name, field) in &self.inner.fields {
            if field.decl().is_internal() {
                continue;
            }
            out.insert(name.clone(), self.get(name).unwrap_or(Value::Null));
        }
        Value::Object(out)
    }

    // -------------------------------------------------------------------------
    // events
    // -------------------------------------------------------------------------

    /// Listen to model-level events.
    pub fn on(&self, events: &str, handler: &Handler, ctx: Option<ContextId>) {
        self.inner.emitter.on(events, handler, ctx);
    }

    pub fn off(&self, events: &str, handler: Option<&Handler>, ctx: Option<ContextId>) {
        self.inner.emitter.off(events, handler, ctx);
    }

    /// Fire a model-level event.
    pub fn emit(&self, event: &str, data: &Value) {
        self.inner.emitter.emit(&Event {
            name: event,
            model: self,
            field: None,
            data,
        });
    }

    /// Listen to field-level events on every whitespace-separated field in
    /// `fields`. Unknown fields are skipped.
    pub fn on_field(&self, fields: &str, events: &str, handler: &Handler, ctx: Option<ContextId>) {
        for name in split_names(fields) {
            if let Some(field) = self.field(name) {
                field.emitter().on(events, handler, ctx);
            }
        }
    }

    pub fn off_field(
        &self,
        fields: &str,
        events: &str,
        handler: Option<&Handler>,
        ctx: Option<ContextId>,
    ) {
        for name in split_names(fields) {
            if let Some(field) = self.field(name) {
                field.emitter().off(events, handler, ctx);
            }
        }
    }

    /// Fire a field-level event on every field in `fields`.
    pub fn emit_field(&self, fields: &str, event: &str, data: &Value) {
        for name in split_names(fields) {
            if let Some(field) = self.field(name) {
                field.emitter().emit(&Event {
                    name: event,
                    model: self,
                    field: Some(name),
                    data,
                });
            }
        }
    }

    /// Number of model-level listeners for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.emitter.listener_count(event)
    }

    /// Number of field-level listeners for `event` on `field`.
    #[must_use]
    pub fn field_listener_count(&self, field: &str, event: &str) -> usize {
        self.field(field)
            .map_or(0, |f| f.emitter().listener_count(event))
    }

    /// Detach every model-level and field-level listener.
    pub fn off_all(&self) {
        self.release_fields();
        self.release_listeners();
    }

    // -------------------------------------------------------------------------
    // lifecycle
    // -------------------------------------------------------------------------

    /// Destroy this instance: tombstone its registry slot, fire `destruct`
    /// and detach every listener.
    pub fn destruct(&self) {
        match self.inner.registry.upgrade() {
            Some(shared) => {
                ModelRegistry::from_shared(shared).destroy_instance(self);
            }
            None => self.off_all(),
        }
    }

    /// Detach field-level listeners ahead of the `destruct` event.
    pub(crate) fn release_fields(&self) {
        for field in self.inner.fields.values() {
            field.destruct();
        }
    }

    /// Detach model-level listeners.
    pub(crate) fn release_listeners(&self) {
        self.inner.emitter.off_all();
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .finish()
    }
}
