//! # Path Codec
//!
//! Canonical hierarchical paths and wildcard path patterns.
//!
//! A path identifies one model instance: `[parent.]name:id[.child]`.
//! A pattern is a path where any id may be the wildcard `*`. Patterns are
//! matched against the END of a concrete path, starting at a segment
//! boundary, so `a:*` matches `a:1` and `p:2.a:1` but not `pa:1`.
//!
//! Several alternative paths may be joined with `,` into a group; groups
//! are only meaningful as queries.

use crate::model::Model;
use crate::primitives::{ANY_ID, CHILD_SEPARATOR, GROUP_SEPARATOR, ID_SEPARATOR};
use crate::types::{ModelError, ModelId};
use indexmap::IndexMap;
use regex::Regex;

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// How a descriptor links to a parent or child model.
#[derive(Debug, Clone)]
pub enum Linkage {
    /// Name plus optional id. A missing id becomes the wildcard.
    Named { name: String, id: Option<ModelId> },
    /// A pre-built path, used verbatim.
    Path(String),
    /// Nested parts, rendered with [`build_path`].
    Parts(Box<Descriptor>),
    /// A live instance; its own path is used.
    Model(Model),
}

impl Linkage {
    fn render(&self) -> String {
        match self {
            Self::Named { name, id } => segment(name, id.as_ref()),
            Self::Path(path) => path.clone(),
            Self::Parts(parts) => build_path(parts),
            Self::Model(model) => model.path().to_string(),
        }
    }
}

/// Describes one model, or a set of models, by type name and position.
///
/// Used for creation, queries, subscriptions and destruction. Converts from
/// a bare type name and from a live [`Model`].
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    /// Type name.
    pub name: String,
    /// Instance id. `None` means "any" in queries and "generate" in `create`.
    pub id: Option<ModelId>,
    /// Pre-built path (or group of paths) overriding the computed one.
    /// Honored by queries, subscriptions and destruction.
    pub path: Option<String>,
    /// Parent linkage.
    pub parent: Option<Linkage>,
    /// Child linkage.
    pub child: Option<Linkage>,
}

impl Descriptor {
    /// Descriptor for every model of a type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the instance id.
    #[must_use]
    pub fn id(mut self, id: impl Into<ModelId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Use a pre-built path or path group.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Link to a parent by name and id.
    #[must_use]
    pub fn parent(mut self, name: impl Into<String>, id: impl Into<ModelId>) -> Self {
        self.parent = Some(Linkage::Named {
            name: name.into(),
            id: Some(id.into()),
        });
        self
    }

    /// Link to any parent of the given type.
    #[must_use]
    pub fn parent_any(mut self, name: impl Into<String>) -> Self {
        self.parent = Some(Linkage::Named {
            name: name.into(),
            id: None,
        });
        self
    }

    /// Link to a parent by its path.
    #[must_use]
    pub fn parent_path(mut self, path: impl Into<String>) -> Self {
        self.parent = Some(Linkage::Path(path.into()));
        self
    }

    /// Link to a parent described by nested parts.
    #[must_use]
    pub fn parent_parts(mut self, parts: Descriptor) -> Self {
        self.parent = Some(Linkage::Parts(Box::new(parts)));
        self
    }

    /// Link to a live parent instance.
    #[must_use]
    pub fn parent_model(mut self, model: &Model) -> Self {
        self.parent = Some(Linkage::Model(model.clone()));
        self
    }

    /// Link to a child by name and id.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>, id: impl Into<ModelId>) -> Self {
        self.child = Some(Linkage::Named {
            name: name.into(),
            id: Some(id.into()),
        });
        self
    }

    /// Link to a child by its path.
    #[must_use]
    pub fn child_path(mut self, path: impl Into<String>) -> Self {
        self.child = Some(Linkage::Path(path.into()));
        self
    }

    /// Link to a live child instance.
    #[must_use]
    pub fn child_model(mut self, model: &Model) -> Self {
        self.child = Some(Linkage::Model(model.clone()));
        self
    }

    /// The explicit path if one was given, otherwise the built path.
    #[must_use]
    pub fn resolve_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| build_path(self))
    }
}

impl From<&str> for Descriptor {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Descriptor {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&Model> for Descriptor {
    fn from(model: &Model) -> Self {
        Self {
            name: model.name().to_string(),
            id: Some(model.id().clone()),
            path: Some(model.path().to_string()),
            parent: None,
            child: None,
        }
    }
}

// =============================================================================
// PATH BUILDING
// =============================================================================

fn segment(name: &str, id: Option<&ModelId>) -> String {
    format!(
        "{}{}{}",
        name,
        ID_SEPARATOR,
        id.map_or(ANY_ID, ModelId::as_str)
    )
}

/// Build the canonical path for a descriptor: parent, then self, then child.
///
/// The explicit `path` override is not consulted here; see
/// [`Descriptor::resolve_path`].
#[must_use]
pub fn build_path(parts: &Descriptor) -> String {
    let parent = parts
        .parent
        .as_ref()
        .map(Linkage::render)
        .filter(|p| !p.is_empty());
    let child = parts
        .child
        .as_ref()
        .map(Linkage::render)
        .filter(|c| !c.is_empty());

    let mut path = String::new();
    if let Some(parent) = parent {
        path.push_str(&parent);
        path.push(CHILD_SEPARATOR);
    }
    path.push_str(&segment(&parts.name, parts.id.as_ref()));
    if let Some(child) = child {
        path.push(CHILD_SEPARATOR);
        path.push_str(&child);
    }
    path
}

/// Build a group path from several descriptors, in order.
#[must_use]
pub fn build_group(parts: &[Descriptor]) -> String {
    parts
        .iter()
        .map(build_path)
        .collect::<Vec<_>>()
        .join(&GROUP_SEPARATOR.to_string())
}

/// Split a group path into its alternatives.
pub fn split_group(path: &str) -> impl Iterator<Item = &str> {
    path.split(GROUP_SEPARATOR)
}

// =============================================================================
// PATTERNS
// =============================================================================

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile one (non-group) pattern.
    ///
    /// Every wildcard becomes "any run of characters other than the child
    /// and id separators"; everything else is literal.
    pub fn compile(pattern: &str) -> Result<Self, ModelError> {
        let any_run = format!(
            "[^{}{}]*",
            regex::escape(&CHILD_SEPARATOR.to_string()),
            regex::escape(&ID_SEPARATOR.to_string())
        );

        let mut source = format!("(?:^|{})", regex::escape(&CHILD_SEPARATOR.to_string()));
        for (i, literal) in pattern.split(ANY_ID).enumerate() {
            if i > 0 {
                source.push_str(&any_run);
            }
            source.push_str(&regex::escape(literal));
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| ModelError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check a concrete path against the pattern.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern text this matcher was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Memo of compiled patterns, keyed by pattern text.
///
/// Compilation is deterministic, so entries never go stale.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: IndexMap<String, PathPattern>,
}

impl PatternCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled matcher for `pattern`, compiling it on first use.
    pub fn get(&mut self, pattern: &str) -> Result<PathPattern, ModelError> {
        if let Some(hit) = self.compiled.get(pattern) {
            return Ok(hit.clone());
        }
        let compiled = PathPattern::compile(pattern)?;
        self.compiled.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Check `path` against `pattern` through the cache.
    pub fn matches(&mut self, pattern: &str, path: &str) -> Result<bool, ModelError> {
        Ok(self.get(pattern)?.is_match(path))
    }

    /// Number of distinct patterns compiled so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Check if nothing was compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Drop every compiled matcher.
    pub fn clear(&mut self) {
        self.compiled.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
