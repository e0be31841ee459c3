//! # Model Registry
//!
//! The facade over declarations, live instances and global subscriptions.
//!
//! A registry is an explicit object: create one, pass it around, `reset` it
//! between test cases. Handles are cheap clones sharing the same state.
//!
//! ## Queries
//!
//! Queries match path patterns against the registered paths of one type and
//! return live instances in slot order. Results are cached per type and
//! query path until the type's instance set changes (create or destroy).
//!
//! ## Re-entrancy
//!
//! Every internal borrow is released before a listener, a behavior hook or
//! a calculation runs, so callbacks may call back into the registry.

mod instances;
mod router;

pub use instances::{InstanceRegistry, SlotState};
pub use router::{EventRouter, Subscription};

use crate::decl::{CompiledType, DeclarationStore, TypeDecl};
use crate::events::{Handler, split_names};
use crate::model::{Model, SetOptions};
use crate::path::{Descriptor, PatternCache, build_path, split_group};
use crate::primitives::{EVENT_CREATE, EVENT_DESTRUCT, GENERATED_ID_PREFIX};
use crate::types::{ContextId, ModelError, ModelId};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::Rc;

/// State shared by every handle of one registry.
#[derive(Debug, Default)]
pub(crate) struct RegistryShared {
    decls: RefCell<DeclarationStore>,
    instances: RefCell<InstanceRegistry>,
    router: RefCell<EventRouter>,
    patterns: RefCell<PatternCache>,
    /// type -> built path -> seed data for `get_or_create`
    seeds: RefCell<IndexMap<String, IndexMap<String, Value>>>,
    next_id: Cell<u64>,
}

/// Declarations, instances and global subscriptions of one model space.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    shared: Rc<RegistryShared>,
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_shared(shared: Rc<RegistryShared>) -> Self {
        Self { shared }
    }

    /// Forget every declaration, instance, subscription and seed.
    ///
    /// Existing instances are not destroyed; they just stop being reachable
    /// through the registry.
    pub fn reset(&self) {
        self.shared.decls.borrow_mut().clear();
        self.shared.instances.borrow_mut().clear();
        self.shared.router.borrow_mut().clear();
        self.shared.patterns.borrow_mut().clear();
        self.shared.seeds.borrow_mut().clear();
        self.shared.next_id.set(0);
        tracing::debug!("registry reset");
    }

    // =========================================================================
    // DECLARATIONS
    // =========================================================================

    /// Compile and register a type.
    ///
    /// Redeclaring a name replaces the declaration and starts an empty
    /// instance table for it.
    ///
    /// # Errors
    ///
    /// `UnknownBaseType`, `UndeclaredDependency` or `CyclicDependency`; the
    /// registry is unchanged on error.
    pub fn declare(&self, decl: TypeDecl) -> Result<Rc<CompiledType>, ModelError> {
        let compiled = self.shared.decls.borrow_mut().declare(decl)?;
        self.shared.instances.borrow_mut().reset_type(compiled.name());
        tracing::debug!(
            model = compiled.name(),
            base = compiled.base().unwrap_or(""),
            fields = compiled.fields().len(),
            "declared model"
        );
        Ok(compiled)
    }

    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.shared.decls.borrow().contains(name)
    }

    #[must_use]
    pub fn declaration(&self, name: &str) -> Option<Rc<CompiledType>> {
        self.shared.decls.borrow().get(name)
    }

    /// Declared type names, in declaration order.
    #[must_use]
    pub fn declared_names(&self) -> Vec<String> {
        self.shared
            .decls
            .borrow()
            .names()
            .map(str::to_string)
            .collect()
    }

    fn require(&self, name: &str) -> Result<Rc<CompiledType>, ModelError> {
        self.declaration(name)
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create, register and announce a new instance.
    ///
    /// See [`ModelRegistry::create_with`].
    pub fn create(
        &self,
        desc: impl Into<Descriptor>,
        data: Option<Value>,
    ) -> Result<Model, ModelError> {
        self.create_with(desc, data, &SetOptions::default())
    }

    /// Create, register and announce a new instance.
    ///
    /// The id comes from the descriptor, else from the id-kind field of
    /// `data`, else it is generated. The id-kind field is then written with
    /// the chosen id. Matching global subscriptions are attached before
    /// `create` fires.
    ///
    /// # Errors
    ///
    /// `UnknownModel` for an undeclared type, `InvalidPattern` when a global
    /// subscription pattern does not compile. Nothing is registered on error.
    pub fn create_with(
        &self,
        desc: impl Into<Descriptor>,
        data: Option<Value>,
        opts: &SetOptions,
    ) -> Result<Model, ModelError> {
        let mut desc = desc.into();
        let decl = self.require(&desc.name)?;
        let mut data = data.unwrap_or_else(|| Value::Object(Map::new()));

        let id_field = decl.id_field().map(str::to_string);
        let from_data = id_field
            .as_deref()
            .and_then(|field| data.get(field))
            .and_then(ModelId::from_value);
        let id = match desc.id.clone() {
            Some(id) => id,
            None => from_data.clone().unwrap_or_else(|| self.generate_id()),
        };
        if let (Some(field), Value::Object(entries)) = (id_field, &mut data) {
            if from_data.as_ref() != Some(&id) {
                entries.insert(field, id.to_value());
            }
        }
        desc.id = Some(id.clone());

        let path = build_path(&desc);
        let model = Model::construct(decl, id, path, &data, Rc::downgrade(&self.shared));
        let bindings = self.matching_subscriptions(model.name(), model.path())?;
        self.shared.instances.borrow_mut().insert(model.clone());
        Self::bind(&model, &bindings);

        tracing::debug!(model = model.path(), "created model");
        model.emit(EVENT_CREATE, &opts.payload([("model", Value::from(model.path()))]));
        Ok(model)
    }

    fn generate_id(&self) -> ModelId {
        let next = self.shared.next_id.get() + 1;
        self.shared.next_id.set(next);
        ModelId(format!("{GENERATED_ID_PREFIX}{next}"))
    }

    /// Global subscriptions of `name` whose pattern matches `path`.
    ///
    /// Resolved before the instance is registered, so a pattern error leaves
    /// the registry unchanged.
    fn matching_subscriptions(
        &self,
        name: &str,
        path: &str,
    ) -> Result<Vec<Subscription>, ModelError> {
        let subs = self.shared.router.borrow().subscriptions_for(name);
        let mut matching = Vec::with_capacity(subs.len());
        for sub in subs {
            if self.matches_group(&sub.path, path)? {
                matching.push(sub);
            }
        }
        Ok(matching)
    }

    /// Attach subscriptions to a new instance as native listeners.
    fn bind(model: &Model, subs: &[Subscription]) {
        for sub in subs {
            tracing::trace!(
                model = model.path(),
                event = %sub.event,
                pattern = %sub.path,
                "attaching subscription"
            );
            match &sub.field {
                None => model.on(&sub.event, &sub.handler, sub.ctx),
                Some(field) => model.on_field(field, &sub.event, &sub.handler, sub.ctx),
            }
        }
    }

    fn matches_group(&self, group: &str, path: &str) -> Result<bool, ModelError> {
        let mut patterns = self.shared.patterns.borrow_mut();
        for alternative in split_group(group) {
            if patterns.matches(alternative, path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Every live instance matching the descriptor.
    ///
    /// # Errors
    ///
    /// `UnknownModel` for an undeclared type, `InvalidPattern` for a path
    /// that does not compile.
    pub fn query(
        &self,
        desc: impl Into<Descriptor>,
        bypass_cache: bool,
    ) -> Result<Vec<Model>, ModelError> {
        let desc = desc.into();
        self.require(&desc.name)?;
        let path = desc.resolve_path();

        if !bypass_cache {
            if let Some(hit) = self.shared.instances.borrow().cached(&desc.name, &path) {
                tracing::trace!(model = %desc.name, path = %path, "query cache hit");
                return Ok(hit);
            }
        }

        tracing::trace!(model = %desc.name, path = %path, "query cache miss");
        let mut found = Vec::new();
        for alternative in split_group(&path) {
            let pattern = self.shared.patterns.borrow_mut().get(alternative)?;
            self.shared
                .instances
                .borrow()
                .scan(&desc.name, &pattern, &mut found);
        }
        self.shared
            .instances
            .borrow_mut()
            .store(&desc.name, &path, found.clone());
        Ok(found)
    }

    /// The last instance matching the descriptor.
    pub fn get_one(&self, desc: impl Into<Descriptor>) -> Result<Option<Model>, ModelError> {
        Ok(self.query(desc, false)?.pop())
    }

    /// The matching instance, or a new one created from the descriptor and
    /// the seed registered for its path.
    pub fn get_or_create(
        &self,
        desc: impl Into<Descriptor>,
        opts: &SetOptions,
    ) -> Result<Model, ModelError> {
        let desc = desc.into();
        if let Some(found) = self.get_one(desc.clone())? {
            return Ok(found);
        }
        let key = build_path(&desc);
        let seed = self
            .shared
            .seeds
            .borrow()
            .get(&desc.name)
            .and_then(|paths| paths.get(&key))
            .cloned();
        self.create_with(desc, seed, opts)
    }

    /// Register seed data for `get_or_create` at one built path.
    pub fn seed(&self, name: &str, path: &str, data: Value) {
        self.shared
            .seeds
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .insert(path.to_string(), data);
    }

    /// Visit every matching instance until `f` breaks.
    pub fn for_each(
        &self,
        desc: impl Into<Descriptor>,
        bypass_cache: bool,
        mut f: impl FnMut(&Model) -> ControlFlow<()>,
    ) -> Result<(), ModelError> {
        for model in self.query(desc, bypass_cache)? {
            if f(&model).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Slot state of a concrete path.
    #[must_use]
    pub fn slot_state(&self, name: &str, path: &str) -> SlotState {
        self.shared.instances.borrow().slot_state(name, path)
    }

    /// Live instances of one type.
    #[must_use]
    pub fn live_count(&self, name: &str) -> usize {
        self.shared.instances.borrow().live_count(name)
    }

    /// Whether queries of `name` are currently served from a cache.
    #[must_use]
    pub fn has_query_cache(&self, name: &str) -> bool {
        self.shared.instances.borrow().has_cache(name)
    }

    /// Total number of global subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.shared.router.borrow().len()
    }

    // =========================================================================
    // DESTRUCTION
    // =========================================================================

    /// Destroy every instance matching the descriptor. Returns how many were
    /// destroyed.
    ///
    /// The lookup bypasses the query cache. A descriptor built from a model
    /// matches by suffix like any pattern; use
    /// [`ModelRegistry::destroy_instance`] to target exactly one instance.
    pub fn destroy(&self, desc: impl Into<Descriptor>) -> Result<usize, ModelError> {
        let desc = desc.into();
        let targets = self.query(desc.clone(), true)?;
        let mut destroyed = 0;
        for model in &targets {
            if self.release(model) {
                destroyed += 1;
            }
        }
        self.shared.instances.borrow_mut().invalidate(&desc.name);
        tracing::debug!(model = %desc.name, count = destroyed, "destroyed models");
        Ok(destroyed)
    }

    /// Destroy one instance. Returns whether it was still registered.
    ///
    /// An instance that is no longer registered only has its listeners
    /// detached.
    pub fn destroy_instance(&self, model: &Model) -> bool {
        self.release(model)
    }

    fn release(&self, model: &Model) -> bool {
        model.release_fields();
        let registered = self.shared.instances.borrow_mut().tombstone(model);
        if registered {
            model.emit(
                EVENT_DESTRUCT,
                &SetOptions::default().payload([("model", Value::from(model.path()))]),
            );
        }
        model.release_listeners();
        registered
    }

    // =========================================================================
    // GLOBAL EVENTS
    // =========================================================================

    /// Subscribe to model-level (or field-level, with `field`) events of
    /// every instance matching the descriptor, now and in the future.
    ///
    /// `field` and `events` may list several whitespace-separated names.
    ///
    /// # Errors
    ///
    /// `UnknownModel`, `UnknownField`, or `InvalidPattern`.
    pub fn subscribe(
        &self,
        desc: impl Into<Descriptor>,
        field: Option<&str>,
        events: &str,
        handler: &Handler,
        ctx: Option<ContextId>,
    ) -> Result<(), ModelError> {
        let desc = desc.into();
        let decl = self.require(&desc.name)?;
        let fields = Self::field_list(&decl, field)?;
        let path = desc.resolve_path();
        for alternative in split_group(&path) {
            self.shared.patterns.borrow_mut().get(alternative)?;
        }
        tracing::debug!(model = %desc.name, path = %path, events, "subscribed");

        {
            let mut router = self.shared.router.borrow_mut();
            for field in &fields {
                for event in split_names(events) {
                    router.register(Subscription {
                        model: desc.name.clone(),
                        path: path.clone(),
                        field: field.clone(),
                        event: event.to_string(),
                        handler: handler.clone(),
                        ctx,
                    });
                }
            }
        }

        for model in self.query(desc, true)? {
            match field {
                None => model.on(events, handler, ctx),
                Some(field) => model.on_field(field, events, handler, ctx),
            }
        }
        Ok(())
    }

    /// Remove subscriptions registered with the same descriptor path,
    /// handler and context, and detach them from matching live instances.
    pub fn unsubscribe(
        &self,
        desc: impl Into<Descriptor>,
        field: Option<&str>,
        events: &str,
        handler: &Handler,
        ctx: Option<ContextId>,
    ) -> Result<(), ModelError> {
        let desc = desc.into();
        let decl = self.require(&desc.name)?;
        let fields = Self::field_list(&decl, field)?;
        let path = desc.resolve_path();

        let mut removed = Vec::new();
        {
            let mut router = self.shared.router.borrow_mut();
            for field in &fields {
                for event in split_names(events) {
                    if let Some(sub) =
                        router.remove(&desc.name, field.as_deref(), event, &path, handler, ctx)
                    {
                        removed.push(sub);
                    }
                }
            }
        }
        if removed.is_empty() {
            return Ok(());
        }

        let models = self.query(desc, true)?;
        for sub in &removed {
            for model in &models {
                match &sub.field {
                    None => model.off(&sub.event, Some(&sub.handler), sub.ctx),
                    Some(field) => model.off_field(field, &sub.event, Some(&sub.handler), sub.ctx),
                }
            }
        }
        Ok(())
    }

    /// Fire model-level (or field-level) events on every currently live
    /// matching instance. The match is redone for each event.
    pub fn emit(
        &self,
        desc: impl Into<Descriptor>,
        field: Option<&str>,
        events: &str,
        data: &Value,
    ) -> Result<(), ModelError> {
        let desc = desc.into();
        for event in split_names(events) {
            for model in self.query(desc.clone(), true)? {
                match field {
                    None => model.emit(event, data),
                    Some(field) => model.emit_field(field, event, data),
                }
            }
        }
        Ok(())
    }

    fn field_list(
        decl: &CompiledType,
        field: Option<&str>,
    ) -> Result<Vec<Option<String>>, ModelError> {
        let Some(field) = field else {
            return Ok(vec![None]);
        };
        split_names(field)
            .map(|name| {
                if decl.field(name).is_some() {
                    Ok(Some(name.to_string()))
                } else {
                    Err(ModelError::UnknownField {
                        model: decl.name().to_string(),
                        field: name.to_string(),
                    })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::FieldDecl;
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry
            .declare(TypeDecl::new("list").field("title", "string"))
            .expect("list");
        registry
            .declare(
                TypeDecl::new("item")
                    .field("key", "id")
                    .field("title", FieldDecl::new("string").value("untitled")),
            )
            .expect("item");
        registry
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = registry();
        assert_eq!(
            registry.create("ghost", None).expect_err("create"),
            ModelError::UnknownModel("ghost".into())
        );
        assert!(registry.query("ghost", false).is_err());
    }

    #[test]
    fn generated_ids_are_sequential() {
        let registry = registry();
        let a = registry.create("list", None).expect("a");
        let b = registry.create("list", None).expect("b");
        assert_eq!(a.id().as_str(), "uniq1");
        assert_eq!(b.id().as_str(), "uniq2");
        assert_eq!(a.path(), "list:uniq1");
    }

    #[test]
    fn id_field_and_descriptor_id_are_reconciled() {
        let registry = registry();
        let from_data = registry
            .create("item", Some(json!({"key": "k7"})))
            .expect("from data");
        assert_eq!(from_data.id().as_str(), "k7");

        let from_desc = registry
            .create(Descriptor::new("item").id("d1"), Some(json!({"key": "other"})))
            .expect("from descriptor");
        assert_eq!(from_desc.id().as_str(), "d1");
        assert_eq!(from_desc.get("key"), Some(json!("d1")));
    }

    #[test]
    fn query_cache_is_invalidated_by_create() {
        let registry = registry();
        registry.create(Descriptor::new("item").id(1), None).expect("1");
        assert_eq!(registry.query("item", false).expect("q").len(), 1);

        registry.create(Descriptor::new("item").id(2), None).expect("2");
        assert_eq!(registry.query("item", false).expect("q").len(), 2);
    }

    #[test]
    fn destroy_tombstones_and_hides_from_queries() {
        let registry = registry();
        let model = registry.create(Descriptor::new("item").id(1), None).expect("1");
        assert_eq!(registry.destroy(Descriptor::new("item").id(1)).expect("destroy"), 1);
        assert_eq!(registry.slot_state("item", "item:1"), SlotState::Tombstoned);
        assert!(registry.query("item", false).expect("q").is_empty());
        assert!(!registry.destroy_instance(&model));
    }

    #[test]
    fn subscription_attaches_to_future_instances() {
        let registry = registry();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let handler = Handler::new(move |_| counter.set(counter.get() + 1));
        registry
            .subscribe("item", Some("title"), "change", &handler, None)
            .expect("subscribe");

        let model = registry.create("item", None).expect("create");
        model.set("title", "x");
        assert_eq!(hits.get(), 1);

        registry
            .unsubscribe("item", Some("title"), "change", &handler, None)
            .expect("unsubscribe");
        model.set("title", "y");
        assert_eq!(hits.get(), 1);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn only_matching_subscriptions_are_bound_on_create() {
        let registry = registry();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let handler = Handler::new(move |_| counter.set(counter.get() + 1));
        registry
            .subscribe(Descriptor::new("item").parent("list", 1), None, "create", &handler, None)
            .expect("subscribe");

        let inside = registry
            .create(Descriptor::new("item").id(1).parent("list", 1), None)
            .expect("inside");
        let outside = registry
            .create(Descriptor::new("item").id(2).parent("list", 2), None)
            .expect("outside");
        assert_eq!(hits.get(), 1);
        assert_eq!(inside.listener_count("create"), 1);
        assert_eq!(outside.listener_count("create"), 0);

        let matching = registry
            .matching_subscriptions("item", "list:2.item:3")
            .expect("matching");
        assert!(matching.is_empty());
        assert_eq!(
            registry
                .matching_subscriptions("item", "list:1.item:3")
                .expect("matching")
                .len(),
            1
        );
    }

    #[test]
    fn failed_create_registers_nothing() {
        let registry = registry();
        registry
            .subscribe("item", None, "create", &Handler::new(|_| {}), None)
            .expect("subscribe");
        assert!(registry.create("ghost", None).is_err());
        assert_eq!(registry.live_count("item"), 0);
        assert_eq!(registry.subscription_count(), 1);
    }

    #[test]
    fn subscribe_rejects_unknown_field() {
        let registry = registry();
        let err = registry
            .subscribe("item", Some("ghost"), "change", &Handler::new(|_| {}), None)
            .expect_err("must fail");
        assert!(matches!(err, ModelError::UnknownField { .. }));
    }

    #[test]
    fn get_or_create_uses_seed() {
        let registry = registry();
        registry.seed("list", "list:main", json!({"title": "Main"}));
        let first = registry
            .get_or_create(Descriptor::new("list").id("main"), &SetOptions::default())
            .expect("create");
        assert_eq!(first.get("title"), Some(json!("Main")));

        let again = registry
            .get_or_create(Descriptor::new("list").id("main"), &SetOptions::default())
            .expect("get");
        assert!(first.same_instance(&again));
    }

    #[test]
    fn reset_forgets_everything() {
        let registry = registry();
        registry.create("list", None).expect("create");
        registry.reset();
        assert!(!registry.is_declared("list"));
        assert_eq!(registry.live_count("list"), 0);
    }
}
