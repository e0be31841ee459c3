//! # Instance Registry
//!
//! Live instances by type name and path, with a per-type query cache.
//!
//! Destroyed instances leave a tombstone in their slot so the slot keeps its
//! position; scans skip tombstones. A new instance created at a tombstoned
//! path reuses the slot.

use crate::model::Model;
use crate::path::PathPattern;
use indexmap::IndexMap;

/// State of one path slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No instance was ever registered at the path.
    Vacant,
    /// A live instance occupies the path.
    Live,
    /// The instance at the path was destroyed.
    Tombstoned,
}

#[derive(Debug, Default)]
struct TypeTable {
    slots: IndexMap<String, Option<Model>>,
    /// Query results by query path. `None` until the first query.
    cache: Option<IndexMap<String, Vec<Model>>>,
}

/// Instance slots for every declared type.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    types: IndexMap<String, TypeTable>,
}

impl InstanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh, empty table for `name`.
    pub fn reset_type(&mut self, name: &str) {
        self.types.insert(name.to_string(), TypeTable::default());
    }

    /// Register an instance under its path, replacing whatever was there.
    pub fn insert(&mut self, model: Model) {
        let table = self.types.entry(model.name().to_string()).or_default();
        table.slots.insert(model.path().to_string(), Some(model));
        table.cache = None;
    }

    /// Tombstone the slot holding exactly this instance.
    ///
    /// Returns `false` when the slot is vacant, already tombstoned, or
    /// taken over by another instance.
    pub fn tombstone(&mut self, model: &Model) -> bool {
        let Some(table) = self.types.get_mut(model.name()) else {
            return false;
        };
        let Some(slot) = table.slots.get_mut(model.path()) else {
            return false;
        };
        if !slot.as_ref().is_some_and(|live| live.same_instance(model)) {
            return false;
        }
        *slot = None;
        table.cache = None;
        true
    }

    /// Drop the query cache of `name`.
    pub fn invalidate(&mut self, name: &str) {
        if let Some(table) = self.types.get_mut(name) {
            table.cache = None;
        }
    }

    /// Cached result of a previous query, if any.
    #[must_use]
    pub fn cached(&self, name: &str, path: &str) -> Option<Vec<Model>> {
        self.types
            .get(name)?
            .cache
            .as_ref()?
            .get(path)
            .cloned()
    }

    /// Remember a query result.
    pub fn store(&mut self, name: &str, path: &str, models: Vec<Model>) {
        if let Some(table) = self.types.get_mut(name) {
            table
                .cache
                .get_or_insert_with(IndexMap::new)
                .insert(path.to_string(), models);
        }
    }

    /// Append every live instance of `name` whose path matches, in slot
    /// order. Instances already in `out` are appended again.
    pub fn scan(&self, name: &str, pattern: &PathPattern, out: &mut Vec<Model>) {
        let Some(table) = self.types.get(name) else {
            return;
        };
        for (path, slot) in &table.slots {
            let Some(model) = slot else {
                continue;
            };
            if pattern.is_match(path) {
                out.push(model.clone());
            }
        }
    }

    #[must_use]
    pub fn slot_state(&self, name: &str, path: &str) -> SlotState {
        match self.types.get(name).and_then(|t| t.slots.get(path)) {
            None => SlotState::Vacant,
            Some(Some(_)) => SlotState::Live,
            Some(None) => SlotState::Tombstoned,
        }
    }

    /// Live instances of `name`.
    #[must_use]
    pub fn live_count(&self, name: &str) -> usize {
        self.types
            .get(name)
            .map_or(0, |t| t.slots.values().filter(|s| s.is_some()).count())
    }

    /// Whether `name` has a populated query cache.
    #[must_use]
    pub fn has_cache(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(|t| t.cache.is_some())
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}
