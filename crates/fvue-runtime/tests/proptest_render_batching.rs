//! Property tests for render batching: any burst of writes between flushes
//! costs at most one render per component, and the host always shows the
//! last written state.

use std::cell::Cell;
use std::rc::Rc;

use fvue_harness::MemoryHost;
use fvue_reactive::{Value, tick};
use fvue_runtime::{ComponentOptions, PropOptions, PropType, global};
use fvue_vdom::VNodeData;
use proptest::prelude::*;

fn bursts() -> impl Strategy<Value = Vec<Vec<i32>>> {
    prop::collection::vec(prop::collection::vec(0i32..4, 0..6), 1..8)
}

proptest! {
    #[test]
    fn each_flush_renders_at_most_once(bursts in bursts()) {
        let host = MemoryHost::new();
        let patcher = host.patcher();
        let container = host.create_container("app");
        let renders = Rc::new(Cell::new(0usize));
        let counted = Rc::clone(&renders);
        let vm = global::new_instance(
            ComponentOptions::new()
                .data(|_| Ok(Value::object([("n", Value::from(0))])))
                .render(move |ctx| {
                    counted.set(counted.get() + 1);
                    Ok(ctx.h("i", None, vec![ctx.text(ctx.get("n").to_display_string())]))
                }),
        )
        .unwrap();
        vm.mount(&patcher, Some(container)).unwrap();

        let mut current = 0;
        let mut expected_renders = 1;
        for burst in &bursts {
            let mut changed = false;
            for &value in burst {
                changed |= value != current;
                current = value;
                vm.set("n", value);
            }
            tick::run_until_idle();
            if changed {
                expected_renders += 1;
            }
            prop_assert_eq!(renders.get(), expected_renders);
            prop_assert_eq!(host.inner_html(host.document()), format!("<i>{current}</i>"));
        }
    }

    #[test]
    fn parent_and_child_settle_in_one_flush(writes in prop::collection::vec(0i32..50, 1..10)) {
        let host = MemoryHost::new();
        let patcher = host.patcher();
        let container = host.create_container("app");
        let child_renders = Rc::new(Cell::new(0usize));
        let counted = Rc::clone(&child_renders);
        let child = global::extend(
            ComponentOptions::new()
                .prop("value", PropOptions::of(PropType::Number))
                .render(move |ctx| {
                    counted.set(counted.get() + 1);
                    Ok(ctx.h("b", None, vec![ctx.text(ctx.get("value").to_display_string())]))
                }),
        );
        let vm = global::new_instance(
            ComponentOptions::new()
                .data(|_| Ok(Value::object([("n", Value::from(-1))])))
                .component("shown", child)
                .render(|ctx| {
                    Ok(ctx.h(
                        "div",
                        None,
                        vec![ctx.h("shown", Some(VNodeData::new().prop("value", ctx.get("n"))), vec![])],
                    ))
                }),
        )
        .unwrap();
        vm.mount(&patcher, Some(container)).unwrap();

        for &value in &writes {
            vm.set("n", value);
        }
        tick::run_until_idle();

        let last = writes[writes.len() - 1];
        prop_assert_eq!(host.inner_html(host.document()), format!("<div><b>{last}</b></div>"));
        prop_assert_eq!(child_renders.get(), 2);
    }
}
