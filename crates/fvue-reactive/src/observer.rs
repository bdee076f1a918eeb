#![forbid(unsafe_code)]

//! Turning plain containers into tracked ones.
//!
//! [`observe`] attaches an [`Observer`] to an object or array: every field
//! of an object becomes a tracked property with its own [`Dep`], and nested
//! containers are observed recursively. The observer's own dependency is
//! what [`set`] and [`del`] notify, and what the intercepted array methods
//! notify, since neither key addition nor index mutation can be trapped.
//!
//! # Invariants
//!
//! 1. `observe` is idempotent: a container already carrying an observer
//!    gets the same observer back.
//! 2. While observation is toggled off ([`toggle_observing`]), no new
//!    observers are created. Already observed values stay observed.
//!
//! # Failure Modes
//!
//! - **Invalid target**: `set`/`del` on a primitive or nullish value warns
//!   and returns [`ReactiveError::InvalidTarget`].
//! - **Root data target**: adding or deleting keys on a component's root
//!   data object warns and does nothing.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use fvue_core::debug;

use crate::dep::Dep;
use crate::error::{ReactiveError, Result};
use crate::value::{Arr, CustomSetter, Field, Obj, Value};

/// Marker attached to an observed container.
pub struct Observer {
    dep: Dep,
    /// Number of component instances using the container as root data.
    vm_count: Cell<usize>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.dep)
            .field("vm_count", &self.vm_count.get())
            .finish()
    }
}

impl Observer {
    fn new() -> Self {
        Self {
            dep: Dep::new(),
            vm_count: Cell::new(0),
        }
    }

    /// The container-level dependency.
    #[must_use]
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    #[must_use]
    pub fn vm_count(&self) -> usize {
        self.vm_count.get()
    }

    /// Called when an instance using this container as root data is torn
    /// down.
    pub fn release_root(&self) {
        self.vm_count.set(self.vm_count.get().saturating_sub(1));
    }
}

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable creation of new observers.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.with(|c| c.set(enabled));
}

#[must_use]
pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Attach (or fetch) the observer for a container value.
///
/// Returns `None` for primitives, for non-extensible containers and while
/// observation is disabled. `as_root_data` bumps the live-instance count
/// that guards against adding keys to component root data.
pub fn observe(value: &Value, as_root_data: bool) -> Option<Rc<Observer>> {
    let ob = match value {
        Value::Object(obj) => match obj.observer() {
            Some(ob) => ob,
            None if should_observe() && obj.is_extensible() => {
                let ob = Rc::new(Observer::new());
                obj.attach_observer(Rc::clone(&ob));
                walk(obj);
                ob
            }
            None => return None,
        },
        Value::Array(arr) => match arr.observer() {
            Some(ob) => ob,
            None if should_observe() && arr.is_extensible() => {
                let ob = Rc::new(Observer::new());
                arr.attach_observer(Rc::clone(&ob));
                observe_items(&arr.to_vec());
                ob
            }
            None => return None,
        },
        _ => return None,
    };
    if as_root_data {
        ob.vm_count.set(ob.vm_count.get() + 1);
    }
    Some(ob)
}

fn walk(obj: &Obj) {
    for (key, value) in obj.entries_untracked() {
        define_reactive(obj, &key, value, None, false);
    }
}

pub(crate) fn observe_items(items: &[Value]) {
    for item in items {
        observe(item, false);
    }
}

/// Install `key` on `obj` as a tracked property holding `value`.
///
/// Existing reactive fields keep their dependency so current subscribers
/// stay attached. Unless `shallow`, `value` is observed as well.
pub fn define_reactive(
    obj: &Obj,
    key: &str,
    value: Value,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
) {
    if !shallow {
        observe(&value, false);
    }
    let dep = obj.field_dep(key).unwrap_or_default();
    obj.put_field(
        key,
        Field {
            value,
            dep: Some(dep),
            shallow,
            custom_setter,
        },
    );
}

/// Subscribe the active watcher to every observed element of `arr`,
/// recursing into nested arrays.
pub fn depend_array(arr: &Arr) {
    for item in arr.to_vec() {
        if let Some(ob) = item.observer() {
            ob.dep().depend();
        }
        if let Value::Array(inner) = &item {
            depend_array(inner);
        }
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<usize>().ok()
}

/// Add or overwrite a property, notifying when the property is new and the
/// target is observed.
///
/// Array targets take a numeric key and go through `splice`, so the array
/// observer fires.
pub fn set(target: &Value, key: &str, value: Value) -> Result<Value> {
    match target {
        Value::Array(arr) => {
            let Some(index) = parse_index(key) else {
                debug::warn(&format!("Cannot set non-index key \"{key}\" on an array."), None);
                return Err(ReactiveError::InvalidKey {
                    key: key.to_string(),
                });
            };
            if index >= arr.len() {
                arr.set_untracked(index, Value::Undefined);
            }
            arr.splice(index, 1, vec![value.clone()]);
            Ok(value)
        }
        Value::Object(obj) => {
            if obj.contains_key(key) {
                obj.set(key, value.clone());
                return Ok(value);
            }
            let ob = obj.observer();
            if ob.as_ref().is_some_and(|ob| ob.vm_count() > 0) {
                debug::warn(
                    "Avoid adding reactive properties to a component instance or its root data \
                     at runtime - declare it upfront in the data option.",
                    None,
                );
                return Ok(value);
            }
            match ob {
                None => obj.set(key, value.clone()),
                Some(ob) => {
                    define_reactive(obj, key, value.clone(), None, false);
                    ob.dep().notify();
                }
            }
            Ok(value)
        }
        other => {
            let target = other.to_js_string();
            debug::warn(
                &format!("Cannot set reactive property on undefined, null, or primitive value: {target}"),
                None,
            );
            Err(ReactiveError::InvalidTarget { target })
        }
    }
}

/// Delete a property, notifying when the target is observed.
pub fn del(target: &Value, key: &str) -> Result<()> {
    match target {
        Value::Array(arr) => {
            let Some(index) = parse_index(key) else {
                return Err(ReactiveError::InvalidKey {
                    key: key.to_string(),
                });
            };
            if index < arr.len() {
                arr.splice(index, 1, Vec::new());
            }
            Ok(())
        }
        Value::Object(obj) => {
            let ob = obj.observer();
            if ob.as_ref().is_some_and(|ob| ob.vm_count() > 0) {
                debug::warn(
                    "Avoid deleting properties on a component instance or its root data \
                     - just set it to null.",
                    None,
                );
                return Ok(());
            }
            if obj.remove_field(key).is_none() {
                return Ok(());
            }
            if let Some(ob) = ob {
                ob.dep().notify();
            }
            Ok(())
        }
        other => {
            let target = other.to_js_string();
            debug::warn(
                &format!("Cannot delete reactive property on undefined, null, or primitive value: {target}"),
                None,
            );
            Err(ReactiveError::InvalidDeleteTarget { target })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_is_idempotent() {
        let v = Value::object([("a", Value::from(1))]);
        let first = observe(&v, false).unwrap();
        let second = observe(&v, false).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(v.as_obj().unwrap().is_reactive_key("a"));
    }

    #[test]
    fn observe_is_deep() {
        let inner = Value::object([("b", Value::from(1))]);
        let list = Value::array([Value::object([("c", Value::Null)])]);
        let v = Value::object([("inner", inner.clone()), ("list", list.clone())]);
        observe(&v, false);
        assert!(inner.observer().is_some());
        assert!(inner.as_obj().unwrap().is_reactive_key("b"));
        assert!(list.observer().is_some());
        assert!(list.as_arr().unwrap().get(0).observer().is_some());
    }

    #[test]
    fn primitives_and_frozen_are_not_observed() {
        assert!(observe(&Value::from(1), false).is_none());
        let frozen = Obj::new();
        frozen.prevent_extensions();
        assert!(observe(&Value::Object(frozen), false).is_none());
    }

    #[test]
    fn toggle_disables_new_observers() {
        toggle_observing(false);
        let v = Value::object([("a", Value::from(1))]);
        assert!(observe(&v, false).is_none());
        toggle_observing(true);
        assert!(observe(&v, false).is_some());
    }

    #[test]
    fn pushed_items_are_observed() {
        let list = Value::array([]);
        observe(&list, false);
        let item = Value::object([("x", Value::from(1))]);
        list.as_arr().unwrap().push([item.clone()]);
        assert!(item.observer().is_some());
    }

    #[test]
    fn set_on_primitive_fails() {
        let err = set(&Value::Null, "a", Value::from(1)).unwrap_err();
        assert!(matches!(err, ReactiveError::InvalidTarget { .. }));
        assert!(del(&Value::from(3), "a").is_err());
    }

    #[test]
    fn set_on_array_index_extends() {
        let list = Value::array([Value::from(1)]);
        observe(&list, false);
        set(&list, "2", Value::from(3)).unwrap();
        let arr = list.as_arr().unwrap();
        assert_eq!(arr.len(), 3);
        assert!(arr.get(1).is_undefined());
        assert!(set(&list, "x", Value::Null).is_err());
        del(&list, "0").unwrap();
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn set_on_unobserved_object_is_plain() {
        let v = Value::object::<&str, _>([]);
        set(&v, "k", Value::from(1)).unwrap();
        assert!(v.as_obj().unwrap().contains_key("k"));
        assert!(!v.as_obj().unwrap().is_reactive_key("k"));
    }

    #[test]
    fn root_data_rejects_new_keys() {
        let data = Value::object([("a", Value::from(1))]);
        observe(&data, true);
        set(&data, "b", Value::from(2)).unwrap();
        assert!(!data.as_obj().unwrap().contains_key("b"));
        del(&data, "a").unwrap();
        assert!(data.as_obj().unwrap().contains_key("a"));
        data.observer().unwrap().release_root();
        del(&data, "a").unwrap();
        assert!(!data.as_obj().unwrap().contains_key("a"));
    }
}
