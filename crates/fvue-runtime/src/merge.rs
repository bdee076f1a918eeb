#![forbid(unsafe_code)]

//! Option merging.
//!
//! [`merge_options`] folds a child's options onto a parent's, field by
//! field. `extends` and then each mixin are folded into the parent side
//! first, so a component always wins over what it builds on.
//!
//! | field                                   | strategy                                   |
//! |-----------------------------------------|--------------------------------------------|
//! | lifecycle hooks, `error_captured`       | concatenate, parent first                  |
//! | `watch`                                 | concatenate per key, parent first          |
//! | `props`, `methods`, `inject`, `computed`| shallow merge, child wins                  |
//! | `components`                            | shallow merge, child wins, parent fallback |
//! | `data`, `provide`                       | composed factory + [`merge_data`]          |
//! | everything else                         | child wins when set                        |
//!
//! # Invariants
//!
//! 1. Merging never mutates either input.
//! 2. The result has no `extends` or `mixins`; they are already applied.

use std::rc::Rc;

use fvue_core::BoxError;
use fvue_reactive::{Obj, Value, observer};
use indexmap::IndexMap;

use crate::instance::Instance;
use crate::options::{ComponentOptions, DataFn, ProvideFn};
use crate::util::validate_component_name;

/// Fold `child` onto `parent`.
#[must_use]
pub fn merge_options(parent: &ComponentOptions, child: &ComponentOptions) -> ComponentOptions {
    for name in child.components.keys() {
        validate_component_name(name);
    }

    let mut base = parent.clone();
    if let Some(extends) = &child.extends {
        base = merge_options(&base, extends);
    }
    for mixin in &child.mixins {
        base = merge_options(&base, mixin);
    }
    let parent = base;

    let mut hooks = parent.hooks.clone();
    for (hook, handlers) in &child.hooks {
        hooks.entry(*hook).or_default().extend(handlers.iter().cloned());
    }

    let mut watch = parent.watch.clone();
    for (key, defs) in &child.watch {
        watch.entry(key.clone()).or_default().extend(defs.iter().cloned());
    }

    let mut error_captured = parent.error_captured.clone();
    error_captured.extend(child.error_captured.iter().cloned());

    ComponentOptions {
        name: child.name.clone().or(parent.name),
        data: merge_data_fn(parent.data, child.data.clone()),
        props: extend(&parent.props, &child.props),
        props_data: child.props_data.clone().or(parent.props_data),
        computed: extend(&parent.computed, &child.computed),
        methods: extend(&parent.methods, &child.methods),
        watch,
        hooks,
        error_captured,
        components: extend(&parent.components, &child.components),
        provide: merge_provide_fn(parent.provide, child.provide.clone()),
        inject: extend(&parent.inject, &child.inject),
        render: child.render.clone().or(parent.render),
        static_render_fns: if child.render.is_some() || !child.static_render_fns.is_empty() {
            child.static_render_fns.clone()
        } else {
            parent.static_render_fns
        },
        template: child.template.clone().or(parent.template),
        delimiters: child.delimiters.clone().or(parent.delimiters),
        abstract_: child.abstract_ || parent.abstract_,
        extends: None,
        mixins: Vec::new(),
    }
}

fn extend<T: Clone>(parent: &IndexMap<String, T>, child: &IndexMap<String, T>) -> IndexMap<String, T> {
    let mut out = parent.clone();
    for (key, value) in child {
        out.insert(key.clone(), value.clone());
    }
    out
}

fn merge_data_fn(parent: Option<DataFn>, child: Option<DataFn>) -> Option<DataFn> {
    match (parent, child) {
        (None, child) => child,
        (parent, None) => parent,
        (Some(parent), Some(child)) => Some(Rc::new(move |vm: &Instance| -> Result<Value, BoxError> {
            let own = child(vm)?;
            let inherited = parent(vm)?;
            match (&own, &inherited) {
                (Value::Object(to), Value::Object(from)) => {
                    merge_data(to, from);
                    Ok(own)
                }
                (Value::Object(_), _) => Ok(own),
                _ => Ok(inherited),
            }
        })),
    }
}

fn merge_provide_fn(parent: Option<ProvideFn>, child: Option<ProvideFn>) -> Option<ProvideFn> {
    match (parent, child) {
        (None, child) => child,
        (parent, None) => parent,
        (Some(parent), Some(child)) => Some(Rc::new(move |vm: &Instance| -> Result<Obj, BoxError> {
            let own = child(vm)?;
            let inherited = parent(vm)?;
            merge_data(&own, &inherited);
            Ok(own)
        })),
    }
}

/// Copy keys of `from` missing in `to`; merge nested plain objects
/// present on both sides. Keys already in `to` win.
pub fn merge_data(to: &Obj, from: &Obj) {
    if to.ptr_eq(from) {
        return;
    }
    for (key, from_value) in from.entries_untracked() {
        if !to.contains_key(&key) {
            // An unobserved target takes the key as a plain field.
            let _ = observer::set(&Value::Object(to.clone()), &key, from_value);
            continue;
        }
        let to_value = to.get_untracked(&key);
        if let (Value::Object(to_obj), Value::Object(from_obj)) = (&to_value, &from_value) {
            merge_data(to_obj, from_obj);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Hook;

    fn obj(pairs: &[(&str, Value)]) -> Obj {
        Obj::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
    }

    #[test]
    fn merge_data_keeps_child_values_and_recurses() {
        let nested_to = obj(&[("a", Value::from(1))]);
        let to = obj(&[("x", Value::from(1)), ("n", Value::Object(nested_to.clone()))]);
        let from = obj(&[
            ("x", Value::from(2)),
            ("y", Value::from(3)),
            ("n", Value::object([("a", Value::from(9)), ("b", Value::from(2))])),
        ]);
        merge_data(&to, &from);
        assert_eq!(to.get_untracked("x").as_f64(), Some(1.0));
        assert_eq!(to.get_untracked("y").as_f64(), Some(3.0));
        assert_eq!(nested_to.get_untracked("a").as_f64(), Some(1.0));
        assert_eq!(nested_to.get_untracked("b").as_f64(), Some(2.0));
    }

    #[test]
    fn hooks_concatenate_parent_first() {
        let parent = ComponentOptions::new().hook(Hook::Created, |_| Ok(()));
        let child = ComponentOptions::new()
            .hook(Hook::Created, |_| Ok(()))
            .hook(Hook::Mounted, |_| Ok(()));
        let merged = merge_options(&parent, &child);
        assert_eq!(merged.hook_handlers(Hook::Created).len(), 2);
        assert!(Rc::ptr_eq(
            &merged.hook_handlers(Hook::Created)[0],
            &parent.hook_handlers(Hook::Created)[0]
        ));
        assert_eq!(merged.hook_handlers(Hook::Mounted).len(), 1);
    }

    #[test]
    fn scalars_are_child_wins() {
        let parent = ComponentOptions::new().name("base").template("<p/>");
        let child = ComponentOptions::new().name("leaf");
        let merged = merge_options(&parent, &child);
        assert_eq!(merged.name.as_deref(), Some("leaf"));
        assert_eq!(merged.template.as_deref(), Some("<p/>"));
    }

    #[test]
    fn methods_shallow_merge_child_wins() {
        let parent = ComponentOptions::new()
            .method("a", |_, _| Ok(Value::from(1)))
            .method("b", |_, _| Ok(Value::from(1)));
        let child = ComponentOptions::new().method("b", |_, _| Ok(Value::from(2)));
        let merged = merge_options(&parent, &child);
        assert_eq!(merged.methods.len(), 2);
        assert!(Rc::ptr_eq(&merged.methods["b"], &child.methods["b"]));
    }

    #[test]
    fn extends_and_mixins_apply_before_child() {
        let base = ComponentOptions::new().name("base").hook(Hook::Created, |_| Ok(()));
        let mixin = ComponentOptions::new().hook(Hook::Created, |_| Ok(()));
        let child = ComponentOptions::new()
            .extends(base)
            .mixin(mixin)
            .hook(Hook::Created, |_| Ok(()));
        let merged = merge_options(&ComponentOptions::new(), &child);
        assert_eq!(merged.name.as_deref(), Some("base"));
        assert_eq!(merged.hook_handlers(Hook::Created).len(), 3);
        assert!(Rc::ptr_eq(
            &merged.hook_handlers(Hook::Created)[2],
            &child.hook_handlers(Hook::Created)[0]
        ));
        assert!(merged.extends.is_none());
        assert!(merged.mixins.is_empty());
    }

    #[test]
    fn watch_concatenates_per_key() {
        let parent = ComponentOptions::new().watch("a", |_, _, _| Ok(()));
        let child = ComponentOptions::new()
            .watch("a", |_, _, _| Ok(()))
            .watch("b", |_, _, _| Ok(()));
        let merged = merge_options(&parent, &child);
        assert_eq!(merged.watch["a"].len(), 2);
        assert_eq!(merged.watch["b"].len(), 1);
    }
}
