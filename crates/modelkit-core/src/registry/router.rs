//! # Event Router
//!
//! Global subscriptions by type name, field and path pattern.
//!
//! A subscription outlives the instances it was attached to: every instance
//! created later whose path matches the pattern gets the listener attached
//! at creation.

use crate::events::Handler;
use crate::types::ContextId;
use indexmap::IndexMap;

/// One registered global listener.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Type name.
    pub model: String,
    /// Path pattern (or group of patterns).
    pub path: String,
    /// Field name for field-level subscriptions.
    pub field: Option<String>,
    /// Single event name.
    pub event: String,
    pub handler: Handler,
    pub ctx: Option<ContextId>,
}

impl Subscription {
    fn matches(&self, path: &str, handler: &Handler, ctx: Option<ContextId>) -> bool {
        self.path == path && self.handler.same_as(handler) && self.ctx == ctx
    }
}

type EventTable = IndexMap<String, Vec<Subscription>>;

/// Model-level and field-level subscription tables.
#[derive(Debug, Default)]
pub struct EventRouter {
    /// type -> event -> subscriptions
    model_triggers: IndexMap<String, EventTable>,
    /// type -> field -> event -> subscriptions
    field_triggers: IndexMap<String, IndexMap<String, EventTable>>,
}

impl EventRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription.
    pub fn register(&mut self, sub: Subscription) {
        let table = match &sub.field {
            None => self.model_triggers.entry(sub.model.clone()).or_default(),
            Some(field) => self
                .field_triggers
                .entry(sub.model.clone())
                .or_default()
                .entry(field.clone())
                .or_default(),
        };
        table.entry(sub.event.clone()).or_default().push(sub);
    }

    /// Remove the first subscription with this path, handler and context.
    pub fn remove(
        &mut self,
        model: &str,
        field: Option<&str>,
        event: &str,
        path: &str,
        handler: &Handler,
        ctx: Option<ContextId>,
    ) -> Option<Subscription> {
        let table = match field {
            None => self.model_triggers.get_mut(model)?,
            Some(field) => self.field_triggers.get_mut(model)?.get_mut(field)?,
        };
        let subs = table.get_mut(event)?;
        let pos = subs.iter().position(|s| s.matches(path, handler, ctx))?;
        Some(subs.remove(pos))
    }

    /// Every subscription for `model`: model-level first, then field-level,
    /// each in registration order.
    #[must_use]
    pub fn subscriptions_for(&self, model: &str) -> Vec<Subscription> {
        let model_level = self
            .model_triggers
            .get(model)
            .into_iter()
            .flat_map(|events| events.values().flatten());
        let field_level = self
            .field_triggers
            .get(model)
            .into_iter()
            .flat_map(|fields| fields.values().flat_map(|events| events.values().flatten()));
        model_level.chain(field_level).cloned().collect()
    }

    /// Total number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        let model_level: usize = self
            .model_triggers
            .values()
            .flat_map(IndexMap::values)
            .map(Vec::len)
            .sum();
        let field_level: usize = self
            .field_triggers
            .values()
            .flat_map(IndexMap::values)
            .flat_map(IndexMap::values)
            .map(Vec::len)
            .sum();
        model_level + field_level
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.model_triggers.clear();
        self.field_triggers.clear();
    }
}
