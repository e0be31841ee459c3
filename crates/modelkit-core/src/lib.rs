//! # modelkit-core
//!
//! The declarative model layer for modelkit - THE LOGIC.
//!
//! Types are declared once: named fields, an optional base type, derived
//! fields computed from other fields. Instances are created from those
//! declarations, addressed by hierarchical paths, queried with wildcard
//! patterns, and observed through per-instance and global events.
//!
//! ## Components
//!
//! - `path` - canonical paths and wildcard patterns
//! - `decl` - declarations, dependency graph, declaration store
//! - `field` / `model` - per-instance state and change tracking
//! - `registry` - instances, query cache, global subscriptions
//! - `schema` - TOML/JSON schema files
//!
//! ## Architectural Constraints
//!
//! - Single-threaded: handles are `Rc`-based and `!Send`
//! - Deterministic: insertion-ordered maps, stable recomputation order
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod decl;
pub mod events;
pub mod field;
pub mod model;
pub mod path;
pub mod primitives;
pub mod registry;
pub mod schema;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{ContextId, ModelError, ModelId};

// =============================================================================
// RE-EXPORTS: Declarations
// =============================================================================

pub use decl::{
    CalcInput, Calculate, CompiledType, DeclarationStore, DefaultBehavior,
    DependencyGraphBuilder, FieldDecl, FieldKind, InitialValue, ModelBehavior, TypeDecl, ValueFn,
};
pub use validation::{InvalidRule, Rule, ValidationResult};

// =============================================================================
// RE-EXPORTS: Instances and Events
// =============================================================================

pub use events::{Emitter, Event, Handler};
pub use field::Field;
pub use model::{GetMode, Model, SetOptions};
pub use path::{Descriptor, Linkage, PathPattern, PatternCache, build_group, build_path};
pub use registry::{EventRouter, InstanceRegistry, ModelRegistry, SlotState, Subscription};

// =============================================================================
// RE-EXPORTS: Schema Files
// =============================================================================

pub use schema::{
    Builtin, DataRecord, SchemaFile, SchemaFormat, load_schema, parse_records, parse_schema,
};
