//! # Declarations
//!
//! Field and type declarations, and their compiled form.
//!
//! A [`TypeDecl`] is what callers write: a type name, an optional base type
//! and a map of [`FieldDecl`]s. The [`DeclarationStore`] compiles it into a
//! [`CompiledType`]: base fields merged in, `depends_to` derived for every
//! field, the id-kind field located.
//!
//! ## Behavior
//!
//! Instance behavior is extended through the [`ModelBehavior`] trait. The
//! core contract lives in inherent `Model` methods, which a behavior cannot
//! shadow; the only overridable hooks are `init` and the export override
//! `to_json`.

mod deps;
mod store;

pub use deps::DependencyGraphBuilder;
pub use store::DeclarationStore;

use crate::model::Model;
use crate::primitives::ID_KIND;
use crate::validation::Rule;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// FIELD KIND
// =============================================================================

/// Semantic kind of a field, interpreted by the field collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldKind {
    /// Text. Numbers and booleans are stored as their string form.
    #[default]
    String,
    /// Numeric. Numeric strings are parsed on write.
    Number,
    /// Boolean. `"true"`/`"false"` and numbers are coerced on write.
    Boolean,
    /// Instance identity. Its value becomes the instance id.
    Id,
    /// Free-form object.
    Object,
    /// Free-form array.
    Array,
    /// Any other kind; values pass through untouched.
    Other(String),
}

impl FieldKind {
    /// Parse a kind name. Unknown names become [`FieldKind::Other`].
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            ID_KIND => Self::Id,
            "object" => Self::Object,
            "array" => Self::Array,
            other => Self::Other(other.to_string()),
        }
    }

    /// The kind name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Id => ID_KIND,
            Self::Object => "object",
            Self::Array => "array",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FieldKind {
    fn from(kind: &str) -> Self {
        Self::parse(kind)
    }
}

// =============================================================================
// FUNCTION-VALUED DECLARATION PARTS
// =============================================================================

/// Initial value of a field: a literal or a generator called per instance.
#[derive(Clone)]
pub enum InitialValue {
    Literal(Value),
    Computed(Rc<dyn Fn() -> Value>),
}

impl InitialValue {
    /// Produce the value for a new instance.
    #[must_use]
    pub fn resolve(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for InitialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A value-to-value function: formatters and preprocessors.
#[derive(Clone)]
pub struct ValueFn(Rc<dyn Fn(&Value) -> Value>);

impl ValueFn {
    pub fn new(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[must_use]
    pub fn apply(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for ValueFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueFn(..)")
    }
}

/// Arguments handed to a calculation.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcInput {
    /// The field has no antecedents; it is recomputed on every read.
    None,
    /// Exactly one antecedent: its current value.
    Single(Value),
    /// Several antecedents: name to current value, in `depends_from` order.
    Many(IndexMap<String, Value>),
}

impl CalcInput {
    /// Iterate over the antecedent values, in order.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Self::None => Box::new(std::iter::empty()),
            Self::Single(value) => Box::new(std::iter::once(value)),
            Self::Many(values) => Box::new(values.values()),
        }
    }
}

/// A calculation deriving a field from other fields of the same instance.
#[derive(Clone)]
pub struct Calculate(Rc<dyn Fn(&Model, CalcInput) -> Value>);

impl Calculate {
    pub fn new(f: impl Fn(&Model, CalcInput) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[must_use]
    pub fn call(&self, model: &Model, input: CalcInput) -> Value {
        (self.0)(model, input)
    }
}

impl fmt::Debug for Calculate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Calculate(..)")
    }
}

// =============================================================================
// FIELD DECLARATION
// =============================================================================

/// Declaration of a single field.
///
/// Every property is optional so a derived type can override only some
/// properties of a base field; see [`FieldDecl::merged_over`].
#[derive(Debug, Clone, Default)]
pub struct FieldDecl {
    kind: Option<FieldKind>,
    internal: Option<bool>,
    value: Option<InitialValue>,
    default: Option<InitialValue>,
    validation: Option<Vec<Rule>>,
    format: Option<ValueFn>,
    preprocess: Option<ValueFn>,
    calculate: Option<Calculate>,
    depends_from: Option<Vec<String>>,
    /// Derived at compile time, ordered antecedents-first.
    depends_to: Vec<String>,
}

impl FieldDecl {
    /// Declare a field of the given kind.
    #[must_use]
    pub fn new(kind: impl Into<FieldKind>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Exclude the field from `to_json`.
    #[must_use]
    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = Some(internal);
        self
    }

    /// Initial value for new instances.
    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(InitialValue::Literal(value.into()));
        self
    }

    /// Initial value produced per instance.
    #[must_use]
    pub fn value_with(mut self, f: impl Fn() -> Value + 'static) -> Self {
        self.value = Some(InitialValue::Computed(Rc::new(f)));
        self
    }

    /// Default value: the initial value when none is given, and the value
    /// `clear` resets to.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(InitialValue::Literal(value.into()));
        self
    }

    /// Default value produced on demand.
    #[must_use]
    pub fn default_with(mut self, f: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(InitialValue::Computed(Rc::new(f)));
        self
    }

    /// Add a validation rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.validation.get_or_insert_with(Vec::new).push(rule);
        self
    }

    /// Formatter used by formatted reads.
    #[must_use]
    pub fn format(mut self, f: impl Fn(&Value) -> Value + 'static) -> Self {
        self.format = Some(ValueFn::new(f));
        self
    }

    /// Transformation applied to every written value before storage.
    #[must_use]
    pub fn preprocess(mut self, f: impl Fn(&Value) -> Value + 'static) -> Self {
        self.preprocess = Some(ValueFn::new(f));
        self
    }

    /// Make the field calculated.
    #[must_use]
    pub fn calculate(mut self, f: impl Fn(&Model, CalcInput) -> Value + 'static) -> Self {
        self.calculate = Some(Calculate::new(f));
        self
    }

    /// Same as [`FieldDecl::calculate`] with a prebuilt calculation.
    #[must_use]
    pub fn calculation(mut self, calc: Calculate) -> Self {
        self.calculate = Some(calc);
        self
    }

    /// Fields the calculation reads.
    #[must_use]
    pub fn depends_from<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_from = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    // -------------------------------------------------------------------------
    // accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.internal.unwrap_or(false)
    }

    /// `value`, falling back to `default`.
    #[must_use]
    pub fn initial_value(&self) -> Option<Value> {
        self.value
            .as_ref()
            .or(self.default.as_ref())
            .map(InitialValue::resolve)
    }

    /// The declared default, resolved.
    #[must_use]
    pub fn declared_default(&self) -> Option<Value> {
        self.default.as_ref().map(InitialValue::resolve)
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        self.validation.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn formatter(&self) -> Option<&ValueFn> {
        self.format.as_ref()
    }

    #[must_use]
    pub fn preprocessor(&self) -> Option<&ValueFn> {
        self.preprocess.as_ref()
    }

    #[must_use]
    pub fn calculation_fn(&self) -> Option<&Calculate> {
        self.calculate.as_ref()
    }

    #[must_use]
    pub fn is_calculated(&self) -> bool {
        self.calculate.is_some()
    }

    /// Antecedents (`depends_from`).
    #[must_use]
    pub fn antecedents(&self) -> &[String] {
        self.depends_from.as_deref().unwrap_or_default()
    }

    /// Dependents (`depends_to`), in recomputation order.
    #[must_use]
    pub fn dependents(&self) -> &[String] {
        &self.depends_to
    }

    /// Overlay this declaration on a base declaration of the same field.
    ///
    /// Properties set here win; unset ones are taken from `base`. The derived
    /// `depends_to` is dropped, it is recomputed for the merged type.
    #[must_use]
    pub fn merged_over(self, base: &FieldDecl) -> FieldDecl {
        FieldDecl {
            kind: self.kind.or_else(|| base.kind.clone()),
            internal: self.internal.or(base.internal),
            value: self.value.or_else(|| base.value.clone()),
            default: self.default.or_else(|| base.default.clone()),
            validation: self.validation.or_else(|| base.validation.clone()),
            format: self.format.or_else(|| base.format.clone()),
            preprocess: self.preprocess.or_else(|| base.preprocess.clone()),
            calculate: self.calculate.or_else(|| base.calculate.clone()),
            depends_from: self.depends_from.or_else(|| base.depends_from.clone()),
            depends_to: Vec::new(),
        }
    }
}

impl From<&str> for FieldDecl {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<FieldKind> for FieldDecl {
    fn from(kind: FieldKind) -> Self {
        Self::new(kind)
    }
}

// =============================================================================
// BEHAVIOR
// =============================================================================

/// Instance-level behavior attached to a declared type.
///
/// Derived types inherit their base type's behavior unless they set one.
pub trait ModelBehavior {
    /// Runs once per instance after its fields are initialized and before
    /// it is registered.
    fn init(&self, _model: &Model) {}

    /// Export override. `None` keeps the default export of every
    /// non-internal field.
    fn to_json(&self, _model: &Model) -> Option<Value> {
        None
    }
}

/// Behavior of types that declare none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl ModelBehavior for DefaultBehavior {}

// =============================================================================
// TYPE DECLARATION
// =============================================================================

/// A type declaration as written by the caller.
#[derive(Clone)]
pub struct TypeDecl {
    name: String,
    base: Option<String>,
    fields: IndexMap<String, FieldDecl>,
    behavior: Option<Rc<dyn ModelBehavior>>,
}

impl TypeDecl {
    /// Start a declaration for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            fields: IndexMap::new(),
            behavior: None,
        }
    }

    /// Derive from a previously declared type.
    #[must_use]
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add a field. A bare kind string is shorthand for `FieldDecl::new(kind)`.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, decl: impl Into<FieldDecl>) -> Self {
        self.fields.insert(name.into(), decl.into());
        self
    }

    /// Attach instance behavior.
    #[must_use]
    pub fn behavior(mut self, behavior: impl ModelBehavior + 'static) -> Self {
        self.behavior = Some(Rc::new(behavior));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDecl")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("fields", &self.fields)
            .finish()
    }
}

// =============================================================================
// COMPILED TYPE
// =============================================================================

/// A declared type after compilation.
pub struct CompiledType {
    name: String,
    base: Option<String>,
    fields: IndexMap<String, Rc<FieldDecl>>,
    behavior: Rc<dyn ModelBehavior>,
    id_field: Option<String>,
}

impl CompiledType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Compiled fields in declaration order (base fields first).
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Rc<FieldDecl>> {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Rc<FieldDecl>> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn behavior(&self) -> &Rc<dyn ModelBehavior> {
        &self.behavior
    }

    /// The field of kind `id`, if any. With several, the last one wins.
    #[must_use]
    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }
}

impl fmt::Debug for CompiledType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledType")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("id_field", &self.id_field)
            .finish()
    }
}
