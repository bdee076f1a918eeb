//! End-to-end reactivity scenarios: explicit `set`, deep watches on
//! intercepted array mutations, and nested computed tracking.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fvue_reactive::{Value, Watcher, observe, set, tick};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

// ═════════════════════════════════════════════════════════════════════════
// Adding keys through `set`
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn set_notifies_container_readers_only() {
    let data = Value::object([
        ("user", Value::object([("name", Value::from("ada"))])),
        ("other", Value::from(1)),
    ]);
    observe(&data, false);
    let root = data.as_obj().unwrap().clone();

    // Reads `user`, which subscribes to the user object's own dependency.
    let container_runs = counter();
    let c = Rc::clone(&container_runs);
    let r = root.clone();
    let _container = Watcher::builder(move || {
        c.set(c.get() + 1);
        let user = r.get("user");
        Ok(user.as_obj().map(|u| u.get("age")).unwrap_or_default())
    })
    .build()
    .unwrap();

    // Reads only an unrelated field.
    let other_runs = counter();
    let o = Rc::clone(&other_runs);
    let r = root.clone();
    let _other = Watcher::builder(move || {
        o.set(o.get() + 1);
        Ok(r.get("other"))
    })
    .build()
    .unwrap();

    let user = root.get_untracked("user");
    set(&user, "age", Value::from(36)).unwrap();
    tick::run_until_idle();

    assert_eq!(container_runs.get(), 2);
    assert_eq!(other_runs.get(), 1);
    assert!(user.as_obj().unwrap().is_reactive_key("age"));
}

#[test]
fn added_key_is_tracked_afterwards() {
    let data = Value::object([("bag", Value::object::<&str, _>([]))]);
    observe(&data, false);
    let bag = data.as_obj().unwrap().get_untracked("bag");
    set(&bag, "k", Value::from(1)).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let b = bag.clone();
    let _w = Watcher::builder(move || Ok(b.as_obj().map(|o| o.get("k")).unwrap_or_default()))
        .callback(move |new, _| {
            s.borrow_mut().push(new.as_f64());
            Ok(())
        })
        .build()
        .unwrap();
    bag.as_obj().unwrap().set("k", Value::from(2));
    tick::run_until_idle();
    assert_eq!(*seen.borrow(), [Some(2.0)]);
}

// ═════════════════════════════════════════════════════════════════════════
// Deep watches
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn deep_watch_sees_nested_push() {
    let data = Value::object([(
        "groups",
        Value::array([Value::object([("items", Value::array([]))])]),
    )]);
    observe(&data, false);
    let root = data.as_obj().unwrap().clone();

    let fired = counter();
    let f = Rc::clone(&fired);
    let r = root.clone();
    let _w = Watcher::builder(move || Ok(r.get("groups")))
        .expression("groups")
        .user()
        .deep()
        .callback(move |_, _| {
            f.set(f.get() + 1);
            Ok(())
        })
        .build()
        .unwrap();

    let groups = root.get_untracked("groups");
    let first = groups.as_arr().unwrap().get(0);
    let items = first.as_obj().unwrap().get_untracked("items");
    items.as_arr().unwrap().push([Value::from("x")]);
    tick::run_until_idle();
    assert_eq!(fired.get(), 1);
}

#[test]
fn shallow_watch_ignores_nested_push() {
    let data = Value::object([(
        "groups",
        Value::array([Value::object([("items", Value::array([]))])]),
    )]);
    observe(&data, false);
    let root = data.as_obj().unwrap().clone();
    let fired = counter();
    let f = Rc::clone(&fired);
    let r = root.clone();
    let _w = Watcher::builder(move || Ok(r.get("groups")))
        .user()
        .callback(move |_, _| {
            f.set(f.get() + 1);
            Ok(())
        })
        .build()
        .unwrap();
    let groups = root.get_untracked("groups");
    let items = groups.as_arr().unwrap().get(0).as_obj().unwrap().get_untracked("items");
    items.as_arr().unwrap().push([Value::from("x")]);
    tick::run_until_idle();
    assert_eq!(fired.get(), 0);
}

#[test]
fn reading_array_field_tracks_nested_arrays() {
    let inner = Value::array([Value::from(1)]);
    let data = Value::object([("matrix", Value::array([inner.clone()]))]);
    observe(&data, false);
    let root = data.as_obj().unwrap().clone();
    let runs = counter();
    let r = Rc::clone(&runs);
    let _w = Watcher::builder(move || {
        r.set(r.get() + 1);
        Ok(root.get("matrix"))
    })
    .build()
    .unwrap();
    inner.as_arr().unwrap().push([Value::from(2)]);
    tick::run_until_idle();
    assert_eq!(runs.get(), 2);
}

// ═════════════════════════════════════════════════════════════════════════
// Computed chains
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn render_reading_computed_rerenders_on_source_change() {
    let data = Value::object([("first", Value::from("Ada")), ("last", Value::from("L"))]);
    observe(&data, false);
    let root = data.as_obj().unwrap().clone();

    let r = root.clone();
    let full = Watcher::builder(move || {
        Ok(Value::from(format!(
            "{} {}",
            r.get("first").to_display_string(),
            r.get("last").to_display_string()
        )))
    })
    .lazy()
    .build()
    .unwrap();

    let rendered = Rc::new(RefCell::new(String::new()));
    let out = Rc::clone(&rendered);
    let f = full.clone();
    let _render = Watcher::builder(move || {
        f.depend();
        *out.borrow_mut() = f.evaluate()?.to_display_string();
        Ok(Value::Undefined)
    })
    .render()
    .build()
    .unwrap();
    assert_eq!(*rendered.borrow(), "Ada L");

    root.set("last", Value::from("Lovelace"));
    tick::run_until_idle();
    assert_eq!(*rendered.borrow(), "Ada Lovelace");
}
