//! End-to-end visibility scenarios through the inspector.
mod common;
use common::{Event, MockHost};
use kanshi::prelude::*;
use serde_json::json;

#[test]
fn initial_states_follow_when_expressions() {
    let host = MockHost::with_values(&[("kind", json!("circle")), ("radius", json!(10))]);
    let mut inspector = Inspector::builder(common::shape_schema(), host).build();
    inspector.init();

    assert!(inspector.is_visible("radius"));
    // Fields without a when clause are always visible.
    assert!(inspector.is_visible("kind"));
    assert_eq!(inspector.host().renders(), vec![("radius".to_string(), false)]);
}

#[test]
fn fields_without_model_value_start_hidden_when_condition_unmet() {
    let host = MockHost::with_values(&[("kind", json!("square"))]);
    let mut inspector = Inspector::builder(common::shape_schema(), host).build();
    inspector.init();

    assert!(!inspector.is_visible("radius"));
    assert_eq!(inspector.host().renders(), vec![("radius".to_string(), true)]);
}

// Scenario: kind flips away from "circle", the radius hides and its stale
// model value is cleared because of otherwise.unset.
#[test]
fn hiding_with_unset_clears_the_value() {
    let host = MockHost::with_values(&[("kind", json!("circle")), ("radius", json!(10))]);
    let mut inspector = Inspector::builder(common::shape_schema(), host).build();
    inspector.init();
    inspector.host_mut().events.clear();

    inspector.host_mut().set("kind", json!("square"));
    inspector.changed("kind").expect("cascade succeeds");

    assert!(!inspector.is_visible("radius"));
    assert!(!inspector.host().model.contains_key(&Path::parse("radius")));
    assert_eq!(
        inspector.host().events,
        vec![
            Event::Unset {
                path: Path::parse("radius")
            },
            Event::Render {
                path: Path::parse("radius"),
                hidden: true
            },
        ]
    );
}

#[test]
fn revealing_resyncs_without_side_effects_on_the_model() {
    let host = MockHost::with_values(&[("kind", json!("square"))]);
    let mut inspector = Inspector::builder(common::shape_schema(), host).build();
    inspector.init();
    inspector.host_mut().events.clear();

    inspector.host_mut().set("kind", json!("circle"));
    inspector.changed("kind").expect("cascade succeeds");

    assert!(inspector.is_visible("radius"));
    assert_eq!(inspector.host().renders(), vec![("radius".to_string(), false)]);
    assert!(inspector.host().unsets().is_empty());
}

// No-op transitions must not re-render or re-write the model.
#[test]
fn unchanged_state_produces_no_side_effects() {
    let host = MockHost::with_values(&[("kind", json!("circle")), ("radius", json!(10))]);
    let mut inspector = Inspector::builder(common::shape_schema(), host).build();
    inspector.init();
    inspector.host_mut().events.clear();

    // Still a circle: the expression stays true.
    inspector.changed("kind").expect("cascade succeeds");
    assert!(inspector.host().events.is_empty());
}

#[test]
fn notify_respects_sub_and_super_paths() {
    let schema = Schema::from_str(
        r#"{
            "attrs": {
                "properties": {
                    "rect": {
                        "properties": { "fill": { "type": "text" } }
                    },
                    "circle": {
                        "properties": { "fill": { "type": "text" } }
                    }
                }
            },
            "legend": {
                "type": "text",
                "when": { "ne": { "attrs/rect/fill": null } }
            }
        }"#,
    )
    .expect("schema is valid");

    let host = MockHost::with_values(&[("attrs/rect/fill", json!("red"))]);
    let mut inspector = Inspector::builder(schema, host).build();
    inspector.init();
    assert!(inspector.is_visible("legend"));
    inspector.host_mut().events.clear();

    // A change at the watched path's parent notifies the dependent.
    inspector.host_mut().model.remove(&Path::parse("attrs/rect/fill"));
    inspector.changed("attrs/rect").expect("cascade succeeds");
    assert!(!inspector.is_visible("legend"));

    // A cousin path does not.
    inspector.host_mut().events.clear();
    inspector.host_mut().set("attrs/rect/fill", json!("blue"));
    inspector.changed("attrs/circle/fill").expect("cascade succeeds");
    assert!(inspector.host().events.is_empty());
    assert!(!inspector.is_visible("legend"));
}

// Registering the same (path, dependent) pair twice yields two notifications,
// one per dependent definition.
#[test]
fn duplicate_registrations_notify_twice() {
    let mut registry: DependencyRegistry<&str> = DependencyRegistry::new();
    let watched = [Path::parse("attrs/rect/fill")];
    registry.subscribe(&watched, "legend");
    registry.subscribe(&watched, "legend");

    let hits = registry.notify_changed(&Path::parse("attrs/rect"));
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|n| n.tag == "legend"));

    assert!(registry.notify_changed(&Path::parse("attrs/circle/fill")).is_empty());

    registry.clear();
    assert!(registry.notify_changed(&Path::parse("attrs/rect")).is_empty());
}

// Scenario: a wildcard dependency against a concrete changed path captures
// the index and applies it to the sibling comparison path.
#[test]
fn wildcard_capture_scopes_to_the_changed_row() {
    let host = MockHost::with_values(&[
        ("items/0/unit", json!("custom")),
        ("items/0/value", json!(5)),
        ("items/3/unit", json!("custom")),
        ("items/3/value", json!(7)),
    ]);
    let mut inspector = Inspector::builder(common::items_schema(), host).build();
    inspector.init();
    inspector.host_mut().events.clear();

    inspector.host_mut().set("items/3/unit", json!("metric"));
    inspector.changed("items/3/unit").expect("cascade succeeds");

    // Row 3 hides and clears; row 0 is untouched.
    assert!(!inspector.is_visible("items/3/value"));
    assert!(inspector.is_visible("items/0/value"));
    assert!(!inspector.host().model.contains_key(&Path::parse("items/3/value")));
    assert_eq!(inspector.host().model.get(&Path::parse("items/0/value")), Some(&json!(5)));
    assert_eq!(inspector.host().unsets(), vec!["items/3/value".to_string()]);
}

// An unset side effect is itself a model change and feeds dependents of the
// cleared path, iteratively rather than recursively.
#[test]
fn unset_cascades_to_dependents_of_the_cleared_field() {
    let schema = Schema::from_str(
        r#"{
            "a": { "type": "number" },
            "b": {
                "type": "number",
                "when": { "eq": { "a": 1 }, "otherwise": { "unset": true } }
            },
            "c": {
                "type": "number",
                "when": { "not": { "eq": { "b": null } } }
            }
        }"#,
    )
    .expect("schema is valid");

    let host = MockHost::with_values(&[("a", json!(1)), ("b", json!(5))]);
    let mut inspector = Inspector::builder(schema, host).build();
    inspector.init();
    assert!(inspector.is_visible("b"));
    assert!(inspector.is_visible("c"));

    inspector.host_mut().set("a", json!(2));
    inspector.changed("a").expect("cascade succeeds");

    assert!(!inspector.is_visible("b"));
    // c watched b; the unset of b propagated within the same cascade.
    assert!(!inspector.is_visible("c"));
}

#[test]
fn cyclic_dependencies_terminate() {
    let schema = Schema::from_str(
        r#"{
            "x": {
                "type": "number",
                "when": { "eq": { "y": null }, "otherwise": { "unset": true } }
            },
            "y": {
                "type": "number",
                "when": { "eq": { "x": null }, "otherwise": { "unset": true } }
            }
        }"#,
    )
    .expect("schema is valid");

    let host = MockHost::with_values(&[("x", json!(1)), ("y", json!(2))]);
    let mut inspector = Inspector::builder(schema, host).build();
    inspector.init();

    // Both conditions are false at init; clearing y flips x's condition.
    inspector.host_mut().model.remove(&Path::parse("y"));
    inspector.changed("y").expect("cascade terminates");
}

#[test]
fn revealing_a_pattern_field_without_value_or_default_is_fatal() {
    let schema = Schema::from_str(
        r#"{
            "kind": { "type": "select" },
            "code": {
                "type": "text",
                "valueRegExp": "^\\d+$",
                "when": { "eq": { "kind": "numbered" } }
            }
        }"#,
    )
    .expect("schema is valid");

    let host = MockHost::with_values(&[("kind", json!("plain"))]);
    let mut inspector = Inspector::builder(schema, host).build();
    inspector.init();
    assert!(!inspector.is_visible("code"));

    inspector.host_mut().set("kind", json!("numbered"));
    let error = inspector.changed("kind").expect_err("missing default is fatal");
    assert!(matches!(error, EvalError::MissingDefault { ref path } if *path == Path::parse("code")));
}

// A fatal error mid-cascade must drop the rest of that cascade: pending
// unset-paths belong to the failed call, not to whichever change comes next.
#[test]
fn failed_cascade_does_not_leak_into_the_next_one() {
    let schema = Schema::from_str(
        r#"{
            "a": { "type": "select" },
            "b": {
                "type": "number",
                "when": { "eq": { "a": 1 }, "otherwise": { "unset": true } }
            },
            "c": {
                "type": "text",
                "valueRegExp": "^\\d+$",
                "when": { "eq": { "a": 2 } }
            },
            "d": {
                "type": "number",
                "when": { "not": { "eq": { "b": null } } }
            }
        }"#,
    )
    .expect("schema is valid");

    let host = MockHost::with_values(&[("a", json!(1)), ("b", json!(5))]);
    let mut inspector = Inspector::builder(schema, host).build();
    inspector.init();
    assert!(inspector.is_visible("d"));

    // b hides and is unset first, then c's reveal hits the missing default.
    inspector.host_mut().set("a", json!(2));
    inspector.changed("a").expect_err("missing default is fatal");

    // An unrelated change afterwards must not replay b's pending unset.
    inspector.host_mut().events.clear();
    inspector.changed("z").expect("cascade succeeds");
    assert!(inspector.host().events.is_empty());
    assert!(inspector.is_visible("d"));
}

#[test]
fn pattern_field_with_default_reveals_cleanly() {
    let schema = Schema::from_str(
        r#"{
            "kind": { "type": "select" },
            "code": {
                "type": "text",
                "valueRegExp": "^\\d+$",
                "defaultValue": "0",
                "when": { "eq": { "kind": "numbered" } }
            }
        }"#,
    )
    .expect("schema is valid");

    let host = MockHost::with_values(&[("kind", json!("plain"))]);
    let mut inspector = Inspector::builder(schema, host).build();
    inspector.init();

    inspector.host_mut().set("kind", json!("numbered"));
    inspector.changed("kind").expect("default value covers the gap");
    assert!(inspector.is_visible("code"));
}

#[test]
fn clear_drops_all_registrations_and_state() {
    let host = MockHost::with_values(&[("kind", json!("circle")), ("radius", json!(10))]);
    let mut inspector = Inspector::builder(common::shape_schema(), host).build();
    inspector.init();
    inspector.clear();
    inspector.host_mut().events.clear();

    inspector.host_mut().set("kind", json!("square"));
    inspector.changed("kind").expect("cascade succeeds");
    assert!(inspector.host().events.is_empty());
}

#[test]
fn unknown_paths_resolve_to_the_default_definition() {
    let schema = common::shape_schema();
    let def = schema.definition_at(&Path::parse("no/such/field"));
    assert_eq!(def, FieldDef::default());

    // Known paths resolve to their real definition.
    let radius = schema.definition_at(&Path::parse("radius"));
    assert!(matches!(radius.shape, FieldShape::Leaf { ref field_type } if field_type == "number"));
    assert!(radius.when.is_some());
}

#[test]
fn ambiguous_shapes_are_rejected_at_load() {
    let error = Schema::from_str(r#"{ "bad": { "type": "number", "item": { "type": "text" } } }"#)
        .expect_err("conflicting shape keys");
    assert!(matches!(error, SchemaError::AmbiguousShape { .. }));
}

// A list row's when clause has no model value under its template path; rows
// get their visibility on first change, never a render of the wildcard path.
#[test]
fn init_skips_wildcard_template_paths() {
    let host = MockHost::with_values(&[
        ("items/0/unit", json!("custom")),
        ("items/0/value", json!(5)),
    ]);
    let mut inspector = Inspector::builder(common::items_schema(), host).build();
    inspector.init();

    assert!(inspector.host().renders().is_empty());
    assert!(inspector.is_visible("items/0/value"));

    // The first change establishes the row's state as usual.
    inspector.host_mut().set("items/0/unit", json!("metric"));
    inspector.changed("items/0/unit").expect("cascade succeeds");
    assert!(!inspector.is_visible("items/0/value"));
    assert_eq!(
        inspector.host().renders(),
        vec![("items/0/value".to_string(), true)]
    );
}

#[test]
fn list_items_flatten_under_a_wildcard_segment() {
    let schema = common::items_schema();
    let paths: Vec<String> = schema
        .flatten()
        .into_iter()
        .map(|(path, _)| path.to_string())
        .collect();
    assert!(paths.contains(&"items/*/unit".to_string()));
    assert!(paths.contains(&"items/*/value".to_string()));
}
