#![forbid(unsafe_code)]

//! Prop resolution, validation and extraction from placeholder data.
//!
//! # Invariants
//!
//! 1. A declared prop always exists on the props object, `Undefined` when
//!    absent and without default.
//! 2. A prop absent from the incoming values keeps its previous default
//!    object rather than receiving a fresh one on every parent render.
//! 3. Values passed by a parent are not deeply observed by the child;
//!    default values are.
//!
//! # Boolean casting
//!
//! For a prop accepting `Boolean`:
//!
//! | incoming                      | result                               |
//! |-------------------------------|--------------------------------------|
//! | absent, no default            | `false`                              |
//! | `""` or the hyphenated name   | `true`, unless `String` precedes `Boolean` |

use std::rc::Rc;

use fvue_core::{config, debug};
use fvue_reactive::{Obj, Value, observe, observer::define_reactive, should_observe, toggle_observing};
use fvue_vdom::VNodeData;

use crate::instance::Instance;
use crate::lifecycle;
use crate::options::{ComponentOptions, DefaultValue, PropOptions, PropType};
use crate::util::{hyphenate, is_reserved_attribute};

pub(crate) fn init_props(vm: &Instance) {
    let is_root = vm.parent().is_none();
    let previous = should_observe();
    if !is_root {
        toggle_observing(false);
    }
    let props_data = vm.0.props_data.borrow().clone();
    for (key, prop) in &vm.options().props {
        let value = validate_prop(key, prop, &props_data, vm);
        let hyphenated = hyphenate(key);
        if is_reserved_attribute(&hyphenated) || config::is_reserved_attr(&hyphenated) {
            debug::warn(
                &format!("\"{hyphenated}\" is a reserved attribute and cannot be used as component prop."),
                Some(vm.scope()),
            );
        }
        let weak = vm.downgrade();
        let name = key.clone();
        let warn_on_write: Rc<dyn Fn()> = Rc::new(move || {
            let Some(vm) = weak.upgrade() else {
                return;
            };
            if vm.parent().is_some() && !lifecycle::is_updating_child_component() {
                debug::warn(
                    &format!(
                        "Avoid mutating a prop directly since the value will be overwritten \
                         whenever the parent component re-renders. Instead, use a data or \
                         computed property based on the prop's value. Prop being mutated: \"{name}\""
                    ),
                    Some(vm.scope()),
                );
            }
        });
        define_reactive(&vm.0.props, key, value, Some(warn_on_write), false);
    }
    toggle_observing(previous);
}

/// Resolve the value of prop `key` from `props_data`.
pub(crate) fn validate_prop(key: &str, prop: &PropOptions, props_data: &Obj, vm: &Instance) -> Value {
    let absent = !props_data.contains_key(key);
    let mut value = props_data.get_untracked(key);

    if let Some(bool_index) = type_index(prop, PropType::Boolean) {
        if absent && prop.default.is_none() {
            value = Value::Bool(false);
        } else if value.as_str() == Some("") || value.as_str() == Some(hyphenate(key).as_str()) {
            let string_index = type_index(prop, PropType::String);
            if string_index.is_none_or(|s| bool_index < s) {
                value = Value::Bool(true);
            }
        }
    }

    if value.is_undefined() {
        value = default_value(vm, prop, key);
        let previous = should_observe();
        toggle_observing(true);
        observe(&value, false);
        toggle_observing(previous);
    }

    assert_prop(prop, key, &value, vm, absent);
    value
}

fn type_index(prop: &PropOptions, ty: PropType) -> Option<usize> {
    prop.types.iter().position(|t| *t == ty)
}

fn default_value(vm: &Instance, prop: &PropOptions, key: &str) -> Value {
    let Some(default) = &prop.default else {
        return Value::Undefined;
    };
    if let DefaultValue::Value(value) = default {
        if matches!(value, Value::Object(_) | Value::Array(_)) {
            debug::warn(
                &format!(
                    "Invalid default value for prop \"{key}\": Props with type Object/Array \
                     must use a factory function to return the default value."
                ),
                Some(vm.scope()),
            );
        }
    }
    let previous_data = vm.0.props_data.borrow().clone();
    let current = vm.0.props.get_untracked(key);
    if previous_data.get_untracked(key).is_undefined() && !current.is_undefined() {
        return current;
    }
    match default {
        DefaultValue::Value(value) => value.clone(),
        DefaultValue::Factory(factory) => factory(vm),
    }
}

fn assert_prop(prop: &PropOptions, key: &str, value: &Value, vm: &Instance, absent: bool) {
    if prop.required && absent {
        debug::warn(&format!("Missing required prop: \"{key}\""), Some(vm.scope()));
        return;
    }
    if value.is_nullish() && !prop.required {
        return;
    }
    if !prop.types.is_empty() && !prop.types.iter().any(|t| t.accepts(value)) {
        let expected: Vec<&str> = prop.types.iter().map(|t| t.name()).collect();
        debug::warn(
            &format!(
                "Invalid prop: type check failed for prop \"{key}\". Expected {}, got {}.",
                expected.join(", "),
                value.type_name()
            ),
            Some(vm.scope()),
        );
        return;
    }
    if let Some(validator) = &prop.validator {
        if !validator(value) {
            debug::warn(
                &format!("Invalid prop: custom validator check failed for prop \"{key}\"."),
                Some(vm.scope()),
            );
        }
    }
}

/// Pull declared props out of a component tag's data: `props` first, then
/// `attrs` (matched attributes are consumed so they do not also land on
/// the root element).
pub(crate) fn extract_props(data: &mut VNodeData, options: &ComponentOptions, tag: Option<&str>) -> Obj {
    let res = Obj::new();
    for key in options.props.keys() {
        let alt = hyphenate(key);
        let lower = key.to_lowercase();
        if lower != *key && data.attrs.contains_key(&lower) {
            debug::tip(
                &format!(
                    "Prop \"{lower}\" is passed to component <{}>, but the declared prop name is \
                     \"{key}\". Note that HTML attributes are case-insensitive and camelCased \
                     props need to use their kebab-case equivalents when using in-DOM \
                     templates. You should probably use \"{alt}\" instead of \"{key}\".",
                    tag.unwrap_or("anonymous")
                ),
                None,
            );
        }
        let from_props = take(&mut data.props, key, &alt, true);
        let value = match from_props {
            Some(value) => Some(value),
            None => take(&mut data.attrs, key, &alt, false),
        };
        if let Some(value) = value {
            res.set(key, value);
        }
    }
    res
}

fn take(
    map: &mut indexmap::IndexMap<String, Value>,
    key: &str,
    alt: &str,
    preserve: bool,
) -> Option<Value> {
    for candidate in [key, alt] {
        if map.contains_key(candidate) {
            return if preserve {
                map.get(candidate).cloned()
            } else {
                map.shift_remove(candidate)
            };
        }
    }
    None
}
