//! # Schema Files
//!
//! Declarative type definitions in TOML or JSON, and JSON instance data.
//!
//! ```toml
//! [models.line]
//! fields.qty = { type = "number", value = 1, validation = { min = 1 } }
//! fields.price = "number"
//! fields.total = { type = "number", calculate = "product", depends_from = ["qty", "price"] }
//!
//! [models.discounted]
//! base = "line"
//! fields.note = { type = "string", internal = true }
//! ```
//!
//! A field entry is either a bare kind string or a table. Calculations are
//! limited to the [`Builtin`] set. Bases may be defined anywhere in the
//! file; they are declared first.

use crate::decl::{Calculate, CalcInput, FieldDecl, TypeDecl};
use crate::path::Descriptor;
use crate::registry::ModelRegistry;
use crate::types::{ModelError, ModelId};
use crate::validation::Rule;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::path::Path;

// =============================================================================
// FILE STRUCTURE
// =============================================================================

/// A whole schema file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub models: IndexMap<String, ModelSchema>,
}

/// One type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSchema {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldSchema>,
}

/// One field: shorthand kind or full table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldSchema {
    Kind(String),
    Full(FieldSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub internal: Option<bool>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub validation: Option<ValidationSpec>,
    #[serde(default)]
    pub calculate: Option<Builtin>,
    #[serde(default, alias = "dependsFrom")]
    pub depends_from: Option<OneOrMany>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default, alias = "minLength")]
    pub min_length: Option<usize>,
    #[serde(default, alias = "maxLength")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(one) => vec![one],
            Self::Many(many) => many,
        }
    }
}

// =============================================================================
// BUILTIN CALCULATIONS
// =============================================================================

/// Calculations available to schema files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    /// Sum of the numeric antecedents.
    Sum,
    /// Product of the numeric antecedents.
    Product,
    /// Non-empty antecedents as text, joined by a space.
    Concat,
    /// The first antecedent, unchanged.
    Copy,
    /// Logical negation of the first antecedent.
    Not,
}

impl Builtin {
    /// The calculation implementing this builtin.
    #[must_use]
    pub fn calculation(self) -> Calculate {
        Calculate::new(move |_, input| self.apply(&input))
    }

    fn apply(self, input: &CalcInput) -> Value {
        match self {
            Self::Sum => number(input.values().filter_map(Value::as_f64).sum()),
            Self::Product => number(input.values().filter_map(Value::as_f64).product()),
            Self::Concat => Value::String(
                input
                    .values()
                    .filter_map(|v| match v {
                        Value::Null => None,
                        Value::String(s) if s.is_empty() => None,
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Self::Copy => input.values().next().cloned().unwrap_or(Value::Null),
            Self::Not => Value::Bool(!input.values().next().is_some_and(truthy)),
        }
    }
}

/// Integral results come back as integers.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Value::Number((value as i64).into());
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// =============================================================================
// CONVERSION
// =============================================================================

impl FieldSchema {
    /// Build the field declaration.
    pub fn to_decl(&self) -> Result<FieldDecl, ModelError> {
        let spec = match self {
            Self::Kind(kind) => return Ok(FieldDecl::new(kind.as_str())),
            Self::Full(spec) => spec,
        };

        let mut decl = match &spec.kind {
            Some(kind) => FieldDecl::new(kind.as_str()),
            None => FieldDecl::default(),
        };
        if let Some(internal) = spec.internal {
            decl = decl.internal(internal);
        }
        if let Some(value) = &spec.value {
            decl = decl.value(value.clone());
        }
        if let Some(default) = &spec.default {
            decl = decl.default_value(default.clone());
        }
        if let Some(validation) = &spec.validation {
            for rule in validation.rules()? {
                decl = decl.rule(rule);
            }
        }
        if let Some(builtin) = spec.calculate {
            decl = decl.calculation(builtin.calculation());
        }
        if let Some(from) = &spec.depends_from {
            decl = decl.depends_from(from.clone().into_vec());
        }
        Ok(decl)
    }
}

impl ValidationSpec {
    fn rules(&self) -> Result<Vec<Rule>, ModelError> {
        let mut rules = Vec::new();
        if self.required {
            rules.push(Rule::Required);
        }
        if let Some(min) = self.min {
            rules.push(Rule::Min(min));
        }
        if let Some(max) = self.max {
            rules.push(Rule::Max(max));
        }
        if let Some(len) = self.min_length {
            rules.push(Rule::MinLength(len));
        }
        if let Some(len) = self.max_length {
            rules.push(Rule::MaxLength(len));
        }
        if let Some(pattern) = &self.pattern {
            rules.push(Rule::pattern(pattern)?);
        }
        Ok(rules)
    }
}

impl ModelSchema {
    /// Build the type declaration.
    pub fn to_decl(&self, name: &str) -> Result<TypeDecl, ModelError> {
        let mut decl = TypeDecl::new(name);
        if let Some(base) = &self.base {
            decl = decl.extends(base.as_str());
        }
        for (field, schema) in &self.fields {
            decl = decl.field(field.as_str(), schema.to_decl()?);
        }
        Ok(decl)
    }
}

impl SchemaFile {
    /// Declare every type into `registry`, bases before derived types.
    ///
    /// Returns the type names in declaration order.
    pub fn declare_into(&self, registry: &ModelRegistry) -> Result<Vec<String>, ModelError> {
        let mut pending: Vec<(&String, &ModelSchema)> = self.models.iter().collect();
        let mut declared = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            // A base still pending must go first. With none ready (a base
            // cycle), the first entry is declared and reports its base.
            let ready = pending
                .iter()
                .position(|(_, schema)| {
                    schema
                        .base
                        .as_ref()
                        .is_none_or(|base| !pending.iter().any(|(name, _)| *name == base))
                })
                .unwrap_or(0);
            let (name, schema) = pending.remove(ready);
            registry.declare(schema.to_decl(name)?)?;
            declared.push(name.clone());
        }
        Ok(declared)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Schema file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Toml,
    Json,
}

impl SchemaFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(ModelError::Schema(format!(
                "unsupported schema extension {:?} for '{}'",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

/// Parse schema text.
pub fn parse_schema(text: &str, format: SchemaFormat) -> Result<SchemaFile, ModelError> {
    match format {
        SchemaFormat::Toml => toml::from_str(text).map_err(|e| ModelError::Schema(e.to_string())),
        SchemaFormat::Json => {
            serde_json::from_str(text).map_err(|e| ModelError::Schema(e.to_string()))
        }
    }
}

/// Read and parse a schema file; the format follows the extension.
pub fn load_schema(path: &Path) -> Result<SchemaFile, ModelError> {
    let format = SchemaFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| ModelError::Io(format!("cannot read '{}': {}", path.display(), e)))?;
    parse_schema(&text, format)
}

// =============================================================================
// INSTANCE DATA
// =============================================================================

/// One instance to create.
#[derive(Debug, Clone, Deserialize)]
pub struct DataRecord {
    pub model: String,
    #[serde(default)]
    pub id: Option<Value>,
    /// Parent path.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl DataRecord {
    /// Descriptor locating the instance.
    #[must_use]
    pub fn descriptor(&self) -> Descriptor {
        let mut desc = Descriptor::new(self.model.as_str());
        desc.id = self.id.as_ref().and_then(ModelId::from_value);
        if let Some(parent) = &self.parent {
            desc = desc.parent_path(parent.as_str());
        }
        desc
    }
}

/// Parse a JSON list of instance records.
pub fn parse_records(text: &str) -> Result<Vec<DataRecord>, ModelError> {
    serde_json::from_str(text).map_err(|e| ModelError::Schema(e.to_string()))
}
