#![forbid(unsafe_code)]

//! The built-in `keep-alive` component.
//!
//! `keep-alive` renders its first component child and caches that child's
//! instance instead of destroying it when the child is switched out.
//! Switching back reuses the cached instance (`activated`) rather than
//! creating a new one.
//!
//! Props:
//!
//! - `include` / `exclude`: comma-separated string or array of component
//!   names to cache or not cache. Changing them prunes the cache.
//! - `max`: cache size; the least recently used entry is destroyed when
//!   exceeded.
//!
//! # Invariants
//!
//! 1. The cache holds at most `max` entries after every render.
//! 2. The entry being rendered is never destroyed by pruning.

use fvue_core::BoxError;
use fvue_reactive::Value;
use fvue_vdom::{ComponentVNodeOptions, VNode};
use indexmap::IndexMap;

use crate::definition::ComponentDef;
use crate::instance::Instance;
use crate::options::{ComponentOptions, Hook, PropOptions, PropType, WatchOptions};
use crate::render::RenderContext;

/// Cached placeholder nodes by key, least recently used first.
pub(crate) type KeepAliveCache = IndexMap<String, VNode>;

pub(crate) fn definition() -> ComponentDef {
    ComponentDef::standalone(
        ComponentOptions::new()
            .name("keep-alive")
            .abstract_(true)
            .prop("include", PropOptions::of(PropType::String).ty(PropType::Array))
            .prop("exclude", PropOptions::of(PropType::String).ty(PropType::Array))
            .prop("max", PropOptions::of(PropType::String).ty(PropType::Number))
            .hook(Hook::Mounted, |vm| {
                vm.watch(
                    "include",
                    |vm, include, _| {
                        prune_cache(vm, |name| matches(include, name));
                        Ok(())
                    },
                    WatchOptions::new(),
                )?;
                vm.watch(
                    "exclude",
                    |vm, exclude, _| {
                        prune_cache(vm, |name| !matches(exclude, name));
                        Ok(())
                    },
                    WatchOptions::new(),
                )?;
                Ok(())
            })
            .hook(Hook::Destroyed, |vm| {
                let keys: Vec<String> = vm.0.keep_alive.borrow().keys().cloned().collect();
                for key in keys {
                    prune_entry(vm, &key, None);
                }
                Ok(())
            })
            .render(render),
    )
}

fn render(ctx: &RenderContext<'_>) -> Result<VNode, BoxError> {
    let vm = ctx.vm();
    let slot = vm.slot_nodes("default");
    let Some(vnode) = slot
        .iter()
        .find(|n| n.component_options().is_some() || n.is_async_placeholder())
        .cloned()
    else {
        return Ok(slot.first().cloned().unwrap_or_else(VNode::empty));
    };
    let Some(options) = vnode.component_options() else {
        return Ok(vnode);
    };

    let name = component_name(options);
    let include = vm.get("include");
    let exclude = vm.get("exclude");
    let not_included = !include.is_nullish() && !name.as_deref().is_some_and(|n| matches(&include, n));
    let excluded = !exclude.is_nullish() && name.as_deref().is_some_and(|n| matches(&exclude, n));
    if not_included || excluded {
        return Ok(vnode);
    }

    let key = cache_key(&vnode, options);
    let max = max_entries(&vm.get("max"));
    let evict = {
        let mut cache = vm.0.keep_alive.borrow_mut();
        match cache.shift_remove(&key) {
            Some(cached) => {
                vnode.set_component_instance(cached.component_instance());
                cache.insert(key, vnode.clone());
                None
            }
            None => {
                cache.insert(key, vnode.clone());
                max.filter(|max| cache.len() > *max)
                    .and_then(|_| cache.first().map(|(k, _)| k.clone()))
            }
        }
    };
    if let Some(oldest) = evict {
        let current = vm.vnode();
        prune_entry(vm, &oldest, current.as_ref());
    }
    vnode.set_keep_alive(true);
    Ok(vnode)
}

fn component_name(options: &ComponentVNodeOptions) -> Option<String> {
    options.ctor.name().or_else(|| options.tag.clone())
}

fn cache_key(vnode: &VNode, options: &ComponentVNodeOptions) -> String {
    match (vnode.key(), &options.tag) {
        (Some(key), _) => key.to_string(),
        (None, Some(tag)) => format!("{}::{tag}", options.ctor.cid()),
        (None, None) => options.ctor.cid().to_string(),
    }
}

fn max_entries(max: &Value) -> Option<usize> {
    match max {
        Value::Number(n) if *n >= 0.0 => Some(*n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether `name` is listed in `pattern`.
fn matches(pattern: &Value, name: &str) -> bool {
    match pattern {
        Value::String(list) => list.split(',').any(|n| n == name),
        Value::Array(items) => items.to_vec().iter().any(|v| v.as_str() == Some(name)),
        _ => false,
    }
}

fn prune_cache(vm: &Instance, keep: impl Fn(&str) -> bool) {
    let current = vm.vnode();
    let entries: Vec<(String, Option<String>)> = vm
        .0
        .keep_alive
        .borrow()
        .iter()
        .map(|(key, node)| (key.clone(), node.component_options().and_then(component_name)))
        .collect();
    for (key, name) in entries {
        if let Some(name) = name {
            if !keep(&name) {
                prune_entry(vm, &key, current.as_ref());
            }
        }
    }
}

fn prune_entry(vm: &Instance, key: &str, current: Option<&VNode>) {
    let cached = vm.0.keep_alive.borrow_mut().shift_remove(key);
    let Some(cached) = cached else {
        return;
    };
    let is_current = current.is_some_and(|cur| same_component(&cached, cur));
    if !is_current {
        if let Some(instance) = cached.component_instance().and_then(Instance::from_handle) {
            instance.destroy();
        }
    }
}

fn same_component(a: &VNode, b: &VNode) -> bool {
    match (a.component_options(), b.component_options()) {
        (Some(x), Some(y)) => x.ctor.cid() == y.ctor.cid() && x.tag == y.tag,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matching() {
        assert!(matches(&Value::from("a,b"), "b"));
        assert!(!matches(&Value::from("a,b"), "c"));
        assert!(matches(&Value::array([Value::from("x")]), "x"));
        assert!(!matches(&Value::Null, "x"));
    }

    #[test]
    fn max_parsing() {
        assert_eq!(max_entries(&Value::from(2)), Some(2));
        assert_eq!(max_entries(&Value::from("3")), Some(3));
        assert_eq!(max_entries(&Value::Undefined), None);
    }
}
