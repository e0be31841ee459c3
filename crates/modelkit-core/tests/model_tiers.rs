//! # Model Tier Tests (T0-T4)
//!
//! Behavioral contract of the model layer, leaves first.
//!
//! ## Tiers
//! - T0: Path Codec
//! - T1: Declaration Compilation
//! - T2: Instance Registry
//! - T3: Global Event Routing
//! - T4: Instance Semantics

#![allow(clippy::unwrap_used, clippy::panic)]

use modelkit_core::{
    Builtin, CalcInput, Descriptor, FieldDecl, Handler, Model, ModelError, ModelRegistry,
    PathPattern, SlotState, TypeDecl, build_group, build_path,
};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn counter() -> (Rc<Cell<u32>>, Handler) {
    let hits = Rc::new(Cell::new(0));
    let sink = Rc::clone(&hits);
    (hits, Handler::new(move |_| sink.set(sink.get() + 1)))
}

fn sum_of(input: &CalcInput) -> Value {
    let total: f64 = input.values().filter_map(Value::as_f64).sum();
    json!(total)
}

// =============================================================================
// TIER T0: PATH CODEC
// =============================================================================

mod t0_path_codec {
    use super::*;

    /// T0.1: name and id build one segment.
    #[test]
    fn plain_segment() {
        assert_eq!(build_path(&Descriptor::new("a").id(1)), "a:1");
    }

    /// T0.2: parent name and id prefix the segment.
    #[test]
    fn parent_prefix() {
        assert_eq!(build_path(&Descriptor::new("a").id(1).parent("p", 2)), "p:2.a:1");
    }

    /// T0.3: an omitted id becomes the wildcard.
    #[test]
    fn omitted_id_is_wildcard() {
        assert_eq!(build_path(&Descriptor::new("a")), "a:*");
    }

    /// T0.4: descriptor sequences join into a group.
    #[test]
    fn group_of_descriptors() {
        let group = build_group(&[Descriptor::new("a").id(1), Descriptor::new("a").id(2)]);
        assert_eq!(group, "a:1,a:2");
    }

    /// T0.5: `a:*` matches any id of `a`; `p:2.a:*` only children of `p:2`.
    #[test]
    fn wildcard_patterns() {
        let any_a = PathPattern::compile("a:*").unwrap();
        assert!(any_a.is_match("a:1"));
        assert!(any_a.is_match("a:xyz"));
        assert!(!any_a.is_match("b:1"));

        let under_p2 = PathPattern::compile("p:2.a:*").unwrap();
        assert!(under_p2.is_match("p:2.a:1"));
        assert!(!under_p2.is_match("p:3.a:1"));
        assert!(!under_p2.is_match("a:1"));
    }

    /// T0.6: a live parent contributes its own path.
    #[test]
    fn parent_model_linkage() {
        let registry = ModelRegistry::new();
        registry.declare(TypeDecl::new("p")).unwrap();
        let parent = registry.create(Descriptor::new("p").id(2), None).unwrap();
        let desc = Descriptor::new("a").id(1).parent_model(&parent);
        assert_eq!(build_path(&desc), "p:2.a:1");
    }
}

// =============================================================================
// TIER T1: DECLARATION COMPILATION
// =============================================================================

mod t1_declarations {
    use super::*;

    /// T1.1: a cyclic declaration fails and is never registered.
    #[test]
    fn cycle_is_fatal_and_not_registered() {
        let registry = ModelRegistry::new();
        let result = registry.declare(
            TypeDecl::new("loop")
                .field("a", FieldDecl::new("number").depends_from(["b"]).calculate(|_, _| json!(0)))
                .field("b", FieldDecl::new("number").depends_from(["a"]).calculate(|_, _| json!(0))),
        );
        match result {
            Err(ModelError::CyclicDependency { model, chain }) => {
                assert_eq!(model, "loop");
                assert_eq!(chain, "a -> b -> a");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert!(!registry.is_declared("loop"));
        assert!(matches!(
            registry.create("loop", None),
            Err(ModelError::UnknownModel(_))
        ));
    }

    /// T1.2: an undeclared antecedent is fatal and names model and field.
    #[test]
    fn undeclared_antecedent_is_fatal() {
        let registry = ModelRegistry::new();
        let err = registry
            .declare(TypeDecl::new("m").field("a", FieldDecl::new("string").depends_from(["zz"])))
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::UndeclaredDependency {
                model: "m".into(),
                field: "zz".into()
            }
        );
    }

    /// T1.3: a single forward pass leaves a chain consistent.
    #[test]
    fn chain_recomputes_in_one_pass() {
        let registry = ModelRegistry::new();
        registry
            .declare(
                TypeDecl::new("chain")
                    .field("c", FieldDecl::new("number").depends_from(["b"]).calculate(|_, i| sum_of(&i)))
                    .field("b", FieldDecl::new("number").depends_from(["a"]).calculate(|_, i| sum_of(&i)))
                    .field("a", FieldDecl::new("number").value(1)),
            )
            .unwrap();
        let model = registry.create("chain", None).unwrap();
        assert_eq!(model.get("c"), Some(json!(1.0)));

        model.set("a", 5);
        assert_eq!(model.get("b"), Some(json!(5.0)));
        assert_eq!(model.get("c"), Some(json!(5.0)));
    }

    /// T1.4: derived types merge base fields and may override them.
    #[test]
    fn inheritance_merges_fields() {
        let registry = ModelRegistry::new();
        registry
            .declare(
                TypeDecl::new("base")
                    .field("title", FieldDecl::new("string").value("base"))
                    .field("count", "number"),
            )
            .unwrap();
        registry
            .declare(
                TypeDecl::new("derived")
                    .extends("base")
                    .field("title", FieldDecl::default().value("derived")),
            )
            .unwrap();

        let model = registry.create("derived", None).unwrap();
        assert_eq!(model.get("title"), Some(json!("derived")));
        assert!(model.has_field("count"));
    }

    /// T1.5: an unknown base is fatal.
    #[test]
    fn unknown_base_is_fatal() {
        let registry = ModelRegistry::new();
        assert!(matches!(
            registry.declare(TypeDecl::new("x").extends("nope")),
            Err(ModelError::UnknownBaseType { .. })
        ));
    }
}

// =============================================================================
// TIER T2: INSTANCE REGISTRY
// =============================================================================

mod t2_instances {
    use super::*;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry
            .declare(TypeDecl::new("product").field("sku", "id").field("name", "string"))
            .unwrap();
        registry.declare(TypeDecl::new("p")).unwrap();
        registry.declare(TypeDecl::new("a").field("v", "number")).unwrap();
        registry
    }

    /// T2.1: the id-kind field supplies the id.
    #[test]
    fn id_from_id_field() {
        let registry = registry();
        let model = registry.create("product", Some(json!({"sku": "X"}))).unwrap();
        assert_eq!(model.id().as_str(), "X");
        assert!(model.path().contains('X'));
        assert_eq!(model.path(), "product:X");
    }

    /// T2.2: an explicit id wins and overwrites the id field.
    #[test]
    fn explicit_id_wins() {
        let registry = registry();
        let model = registry
            .create(Descriptor::new("product").id("Y"), Some(json!({"sku": "X"})))
            .unwrap();
        assert_eq!(model.id().as_str(), "Y");
        assert_eq!(model.get("sku"), Some(json!("Y")));
    }

    /// T2.3: queries by wildcard and by parent.
    #[test]
    fn wildcard_and_parent_queries() {
        let registry = registry();
        registry.create(Descriptor::new("a").id(1), None).unwrap();
        registry.create(Descriptor::new("a").id(1).parent("p", 2), None).unwrap();
        registry.create(Descriptor::new("a").id(2).parent("p", 3), None).unwrap();

        assert_eq!(registry.query("a", false).unwrap().len(), 3);

        let under_p2 = registry
            .query(Descriptor::new("a").parent("p", 2), false)
            .unwrap();
        assert_eq!(under_p2.len(), 1);
        assert_eq!(under_p2[0].path(), "p:2.a:1");
    }

    /// T2.4: group queries keep per-alternative order without dedup.
    #[test]
    fn group_queries_concatenate() {
        let registry = registry();
        registry.create(Descriptor::new("a").id(1), None).unwrap();
        registry.create(Descriptor::new("a").id(2), None).unwrap();

        let found = registry
            .query(Descriptor::new("a").path("a:2,a:*"), true)
            .unwrap();
        let paths: Vec<_> = found.iter().map(Model::path).collect();
        assert_eq!(paths, vec!["a:2", "a:1", "a:2"]);
    }

    /// T2.5: a destroyed path stays empty; a create elsewhere does not
    /// resurrect it.
    #[test]
    fn tombstone_does_not_resurrect() {
        let registry = registry();
        let model = registry.create(Descriptor::new("a").id(1), None).unwrap();
        model.destruct();

        assert!(registry.query(Descriptor::new("a").id(1), false).unwrap().is_empty());
        assert_eq!(registry.slot_state("a", "a:1"), SlotState::Tombstoned);

        registry.create(Descriptor::new("a").id(2), None).unwrap();
        assert!(registry.query(Descriptor::new("a").id(1), false).unwrap().is_empty());
        assert_eq!(registry.slot_state("a", "a:1"), SlotState::Tombstoned);
        assert_eq!(registry.slot_state("a", "a:3"), SlotState::Vacant);
    }

    /// T2.6: create and destroy invalidate the query cache.
    #[test]
    fn cache_invalidation() {
        let registry = registry();
        registry.create(Descriptor::new("a").id(1), None).unwrap();
        assert_eq!(registry.query("a", false).unwrap().len(), 1);
        assert!(registry.has_query_cache("a"));

        registry.create(Descriptor::new("a").id(2), None).unwrap();
        assert!(!registry.has_query_cache("a"));
        assert_eq!(registry.query("a", false).unwrap().len(), 2);

        assert_eq!(registry.destroy(Descriptor::new("a").id(1)).unwrap(), 1);
        assert_eq!(registry.query("a", false).unwrap().len(), 1);
    }

    /// T2.7: get_one returns the last match.
    #[test]
    fn get_one_is_last_match() {
        let registry = registry();
        registry.create(Descriptor::new("a").id(1), None).unwrap();
        registry.create(Descriptor::new("a").id(2), None).unwrap();
        let last = registry.get_one("a").unwrap().unwrap();
        assert_eq!(last.path(), "a:2");
    }

    /// T2.8: for_each stops early.
    #[test]
    fn for_each_breaks() {
        let registry = registry();
        for id in 1..=3 {
            registry.create(Descriptor::new("a").id(id), None).unwrap();
        }
        let mut seen = Vec::new();
        registry
            .for_each("a", false, |m| {
                seen.push(m.id().to_string());
                if seen.len() == 2 {
                    std::ops::ControlFlow::Break(())
                } else {
                    std::ops::ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(seen, vec!["1", "2"]);
    }
}

// =============================================================================
// TIER T3: GLOBAL EVENT ROUTING
// =============================================================================

mod t3_routing {
    use super::*;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry
            .declare(
                TypeDecl::new("item")
                    .field("title", "string")
                    .field("price", "number"),
            )
            .unwrap();
        registry.declare(TypeDecl::new("list")).unwrap();
        registry
    }

    /// T3.1: subscribe before any instance exists; one call per change.
    #[test]
    fn subscription_predates_instance() {
        let registry = registry();
        let (hits, handler) = counter();
        registry.subscribe("item", None, "change", &handler, None).unwrap();

        let model = registry.create("item", None).unwrap();
        assert_eq!(hits.get(), 0);

        model.set("title", "a");
        assert_eq!(hits.get(), 1);

        model.update(&json!({"title": "b", "price": 3}));
        assert_eq!(hits.get(), 2);
    }

    /// T3.2: subscribing after instances exist binds them immediately.
    #[test]
    fn subscription_binds_live_instances() {
        let registry = registry();
        let model = registry.create("item", None).unwrap();
        let (hits, handler) = counter();
        registry
            .subscribe("item", Some("title"), "change", &handler, None)
            .unwrap();
        model.set("title", "x");
        model.set("price", 1);
        assert_eq!(hits.get(), 1);
    }

    /// T3.3: patterns restrict binding to matching paths.
    #[test]
    fn pattern_filters_instances() {
        let registry = registry();
        let (hits, handler) = counter();
        registry
            .subscribe(Descriptor::new("item").parent("list", 1), None, "change", &handler, None)
            .unwrap();

        let inside = registry
            .create(Descriptor::new("item").parent("list", 1), None)
            .unwrap();
        let outside = registry
            .create(Descriptor::new("item").parent("list", 2), None)
            .unwrap();
        inside.set("title", "in");
        outside.set("title", "out");
        assert_eq!(hits.get(), 1);
    }

    /// T3.4: create fires after binding, so subscribers see it.
    #[test]
    fn create_event_reaches_subscribers() {
        let registry = registry();
        let (hits, handler) = counter();
        registry.subscribe("item", None, "create", &handler, None).unwrap();
        registry.create("item", None).unwrap();
        registry.create("item", None).unwrap();
        assert_eq!(hits.get(), 2);
    }

    /// T3.5: unsubscribe unbinds live and future instances.
    #[test]
    fn unsubscribe_unbinds() {
        let registry = registry();
        let (hits, handler) = counter();
        registry.subscribe("item", None, "change", &handler, None).unwrap();
        let model = registry.create("item", None).unwrap();
        registry.unsubscribe("item", None, "change", &handler, None).unwrap();

        model.set("title", "x");
        registry.create("item", None).unwrap().set("title", "y");
        assert_eq!(hits.get(), 0);
        assert_eq!(registry.subscription_count(), 0);
    }

    /// T3.6: context identity must match for unsubscribe.
    #[test]
    fn unsubscribe_needs_same_context() {
        let registry = registry();
        let (hits, handler) = counter();
        let ctx = Some(modelkit_core::ContextId(7));
        registry.subscribe("item", None, "change", &handler, ctx).unwrap();
        registry.unsubscribe("item", None, "change", &handler, None).unwrap();
        assert_eq!(registry.subscription_count(), 1);

        registry.create("item", None).unwrap().set("title", "x");
        assert_eq!(hits.get(), 1);
    }

    /// T3.7: global emit fans out to live matches only.
    #[test]
    fn emit_fans_out() {
        let registry = registry();
        let (hits, handler) = counter();
        registry
            .subscribe("item", None, "ping pong", &handler, None)
            .unwrap();
        registry.create("item", None).unwrap();
        let doomed = registry.create("item", None).unwrap();
        doomed.destruct();

        registry.emit("item", None, "ping pong", &Value::Null).unwrap();
        assert_eq!(hits.get(), 2);
    }

    /// T3.8: unknown types and fields are rejected.
    #[test]
    fn unknown_targets_rejected() {
        let registry = registry();
        let (_, handler) = counter();
        assert!(matches!(
            registry.subscribe("ghost", None, "change", &handler, None),
            Err(ModelError::UnknownModel(_))
        ));
        assert!(matches!(
            registry.subscribe("item", Some("ghost"), "change", &handler, None),
            Err(ModelError::UnknownField { .. })
        ));
        assert!(registry.emit("ghost", None, "x", &Value::Null).is_err());
    }

    /// T3.9: destruct fires once and detaches listeners.
    #[test]
    fn destruct_event_then_detached() {
        let registry = registry();
        let (hits, handler) = counter();
        let model = registry.create("item", None).unwrap();
        model.on("destruct change", &handler, None);

        model.destruct();
        assert_eq!(hits.get(), 1);
        assert_eq!(model.listener_count("change"), 0);

        model.set("title", "late");
        assert_eq!(hits.get(), 1);
    }
}

// =============================================================================
// TIER T4: INSTANCE SEMANTICS
// =============================================================================

mod t4_instances {
    use super::*;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry
            .declare(
                TypeDecl::new("order")
                    .field("a", FieldDecl::new("number").value(1))
                    .field("b", FieldDecl::new("number").value(2))
                    .field(
                        "sum",
                        FieldDecl::new("number")
                            .depends_from(["a", "b"])
                            .calculate(|_, input| sum_of(&input)),
                    )
                    .field("note", FieldDecl::new("string").internal(true)),
            )
            .unwrap();
        registry
    }

    fn change_log(model: &Model) -> Rc<RefCell<Vec<Value>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        model.on(
            "change",
            &Handler::new(move |e| sink.borrow_mut().push(e.data["changedFields"].clone())),
            None,
        );
        log
    }

    /// T4.1: an equal set fires nothing and records nothing.
    #[test]
    fn equal_set_is_silent() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        let (hits, handler) = counter();
        model.on("field-change change", &handler, None);

        assert!(!model.set("a", 1));
        assert_eq!(hits.get(), 0);
        assert!(model.pending_changes().is_empty());
    }

    /// T4.2: fix then rollback keeps values; set then rollback restores.
    #[test]
    fn fix_and_rollback() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();

        model.fix();
        model.rollback(None);
        assert_eq!(model.get("a"), Some(json!(1)));
        assert_eq!(model.get("sum"), Some(json!(3.0)));

        model.set("a", 10);
        model.rollback(None);
        assert_eq!(model.get("a"), Some(json!(1)));
        assert_eq!(model.get("sum"), Some(json!(3.0)));
    }

    /// T4.3: single-field rollback.
    #[test]
    fn rollback_one_field() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        model.set("a", 5);
        model.set("b", 5);
        model.rollback(Some("a"));
        assert_eq!(model.get("a"), Some(json!(1)));
        assert_eq!(model.get("b"), Some(json!(5)));
        assert_eq!(model.get("sum"), Some(json!(6.0)));
    }

    /// T4.4: structural equality.
    #[test]
    fn equality() {
        let registry = registry();
        let x = registry.create("order", None).unwrap();
        let y = registry.create("order", None).unwrap();
        assert!(x.is_equal(&y));

        y.set("b", 9);
        assert!(!x.is_equal(&y));

        assert!(!x.is_equal_data(&json!({"a": 1, "b": 2, "sum": 3.0})));
        assert!(x.is_equal_data(&json!({"a": 1, "b": 2, "sum": 3.0, "note": null})));
    }

    /// T4.5: export hides internal fields; fixed values include them.
    #[test]
    fn export_and_fixed_values() {
        let registry = registry();
        let model = registry
            .create("order", Some(json!({"note": "secret"})))
            .unwrap();
        assert_eq!(model.to_json(), json!({"a": 1, "b": 2, "sum": 3.0}));
        assert_eq!(model.fixed_values()["note"], json!("secret"));
    }

    /// T4.6: a write and its recalculation form one change event.
    #[test]
    fn one_change_per_write() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        let log = change_log(&model);

        model.set("a", 4);
        model.set("b", 4);
        assert_eq!(*log.borrow(), vec![json!(["a", "sum"]), json!(["b", "sum"])]);
    }

    /// T4.7: listeners may write back into the model.
    #[test]
    fn reentrant_listener_write() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        let log = change_log(&model);

        model.on(
            "change",
            &Handler::new(|e| {
                if e.model.get("a") == Some(json!(2)) {
                    e.model.set("b", 20);
                }
            }),
            None,
        );
        model.set("a", 2);
        assert_eq!(model.get("sum"), Some(json!(22.0)));
        assert_eq!(*log.borrow(), vec![json!(["a", "sum"]), json!(["b", "sum"])]);
    }

    /// T4.8: a panicking listener leaves the write applied and the model
    /// usable.
    #[test]
    fn panicking_listener_keeps_write() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        let armed = Rc::new(Cell::new(true));
        let trip = Rc::clone(&armed);
        model.on(
            "change",
            &Handler::new(move |_| {
                if trip.replace(false) {
                    panic!("listener failure");
                }
            }),
            None,
        );
        let log = change_log(&model);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| model.set("a", 7)));
        assert!(outcome.is_err());
        assert_eq!(model.get("a"), Some(json!(7)));
        assert_eq!(model.get("sum"), Some(json!(9.0)));

        model.set("b", 1);
        assert_eq!(*log.borrow(), vec![json!(["b", "sum"])]);
    }

    /// T4.9: a calculated field without antecedents recomputes per read.
    #[test]
    fn antecedent_free_calculation_is_live() {
        let registry = ModelRegistry::new();
        let ticks = Rc::new(Cell::new(0));
        let source = Rc::clone(&ticks);
        registry
            .declare(TypeDecl::new("clock").field(
                "tick",
                FieldDecl::new("number").calculate(move |_, input| {
                    assert!(matches!(input, CalcInput::None));
                    source.set(source.get() + 1);
                    json!(source.get())
                }),
            ))
            .unwrap();
        let model = registry.create("clock", None).unwrap();
        assert_eq!(model.get("tick"), Some(json!(1)));
        assert_eq!(model.get("tick"), Some(json!(2)));
        assert_eq!(ticks.get(), 2);
    }

    /// T4.10: unknown fields read as absent and write as no-ops.
    #[test]
    fn unknown_fields() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        assert_eq!(model.get("ghost"), None);
        assert!(!model.set("ghost", 1));
        assert!(!model.has_field("ghost"));
        assert_eq!(model.get_type("ghost"), None);
    }

    /// T4.11: a listener may destroy the instance it listens to.
    #[test]
    fn listener_destroys_its_model() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        model.on("change", &Handler::new(|e| e.model.destruct()), None);

        model.set("a", 3);
        assert!(registry.query("order", true).unwrap().is_empty());
        assert_eq!(model.listener_count("change"), 0);
    }

    /// T4.12: dependents of fields left unset are computed at creation.
    #[test]
    fn unset_sources_still_compute_dependents() {
        let registry = ModelRegistry::new();
        registry
            .declare(
                TypeDecl::new("switch")
                    .field("on", "boolean")
                    .field(
                        "off",
                        FieldDecl::new("boolean")
                            .depends_from(["on"])
                            .calculation(Builtin::Not.calculation()),
                    )
                    .field("qty", "number")
                    .field(
                        "label",
                        FieldDecl::new("string")
                            .depends_from(["qty"])
                            .calculate(|_, input| match input {
                                CalcInput::Single(Value::Null) => Value::Null,
                                CalcInput::Single(qty) => json!(format!("qty {qty}")),
                                _ => Value::Null,
                            }),
                    ),
            )
            .unwrap();

        let model = registry.create("switch", None).unwrap();
        assert_eq!(model.get("off"), Some(json!(true)));
        assert_eq!(model.get("label"), Some(Value::Null));

        model.set("on", true);
        model.set("qty", 3);
        assert_eq!(model.get("off"), Some(json!(false)));
        assert_eq!(model.get("label"), Some(json!("qty 3")));
    }

    /// T4.13: live calculated fields compare by their current value.
    #[test]
    fn antecedent_free_calculation_equality() {
        let registry = ModelRegistry::new();
        registry
            .declare(
                TypeDecl::new("stamp")
                    .field("now", FieldDecl::new("string").calculate(|_, _| json!("x"))),
            )
            .unwrap();
        let a = registry.create("stamp", None).unwrap();
        let b = registry.create("stamp", None).unwrap();

        assert!(a.is_equal(&a));
        assert!(a.is_equal(&b));
        assert!(a.is_equal_data(&json!({"now": "x"})));
        assert!(!a.is_equal_data(&json!({"now": "y"})));
    }

    /// T4.14: destruct detaches field listeners and fires `destruct` once.
    #[test]
    fn destruct_releases_field_listeners() {
        let registry = registry();
        let model = registry.create("order", None).unwrap();
        let (field_hits, field_handler) = counter();
        let (destructs, destruct_handler) = counter();
        model.on_field("a", "change", &field_handler, None);
        model.on("destruct", &destruct_handler, None);

        model.destruct();
        assert_eq!(destructs.get(), 1);
        assert_eq!(model.field_listener_count("a", "change"), 0);
        assert_eq!(model.listener_count("destruct"), 0);

        model.set("a", 5);
        assert_eq!(field_hits.get(), 0);
    }

    /// T4.15: an instance outliving its registry still detaches everything.
    #[test]
    fn orphan_destruct_detaches_listeners() {
        let model = registry().create("order", None).unwrap();
        let (hits, handler) = counter();
        model.on_field("b", "change", &handler, None);
        model.on("change", &handler, None);

        model.destruct();
        assert_eq!(model.field_listener_count("b", "change"), 0);
        assert_eq!(model.listener_count("change"), 0);
        assert_eq!(hits.get(), 0);
    }
}
