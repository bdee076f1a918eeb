//! Property-based invariants for observation and batching.
//!
//! 1. Observing a nested structure preserves it structurally.
//! 2. Any run of synchronous writes re-runs a dependent watcher once.
//! 3. The watcher observes the last written value.

use std::cell::Cell;
use std::rc::Rc;

use fvue_reactive::value::deep_equals;
use fvue_reactive::{Value, Watcher, observe, tick};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        (-1000i32..1000).prop_map(|n| serde_json::json!(f64::from(n))),
        "[a-z]{0,6}".prop_map(serde_json::Value::String),
    ]
}

fn json_tree() -> impl Strategy<Value = serde_json::Value> {
    json_leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(serde_json::Value::Array),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..6)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Observation round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn observed_tree_reads_back_equal(tree in json_tree()) {
        let original = Value::from(tree.clone());
        let observed = Value::from(tree.clone());
        observe(&observed, false);
        prop_assert!(deep_equals(&original, &observed));
        prop_assert_eq!(observed.to_json(), original.to_json());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2-3. Batching
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn synchronous_writes_rerun_once(writes in proptest::collection::vec(-50i32..50, 1..40)) {
        let data = Value::object([("n", Value::from(1000))]);
        observe(&data, false);
        let root = data.as_obj().unwrap().clone();
        let runs = Rc::new(Cell::new(0usize));
        let last = Rc::new(Cell::new(f64::NAN));
        let (r, l, o) = (Rc::clone(&runs), Rc::clone(&last), root.clone());
        let _w = Watcher::builder(move || {
            r.set(r.get() + 1);
            let v = o.get("n");
            l.set(v.as_f64().unwrap_or(f64::NAN));
            Ok(v)
        })
        .build()
        .unwrap();

        for n in &writes {
            root.set("n", Value::from(*n));
        }
        tick::run_until_idle();

        prop_assert_eq!(runs.get(), 2);
        prop_assert_eq!(last.get(), f64::from(*writes.last().unwrap()));
    }
}
