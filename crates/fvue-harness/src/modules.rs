#![forbid(unsafe_code)]

//! Metadata modules for [`MemoryHost`].
//!
//! Each module diffs one field of [`VNodeData`](fvue_vdom::VNodeData)
//! between the old and new node and applies only the difference.

use std::rc::Rc;

use fvue_reactive::Value;
use fvue_reactive::value::strict_equals;
use fvue_vdom::{Invokers, Module, NodeOps, On, VNode, normalize_event, update_listeners};
use indexmap::IndexMap;

use crate::host::MemoryHost;

const BOOLEAN_ATTRS: [&str; 9] = [
    "autofocus", "checked", "disabled", "hidden", "multiple", "open", "readonly", "required",
    "selected",
];

/// Host attributes (`data.attrs`).
#[derive(Debug)]
pub struct AttrsModule {
    host: Rc<MemoryHost>,
}

impl AttrsModule {
    #[must_use]
    pub fn new(host: Rc<MemoryHost>) -> Self {
        Self { host }
    }

    fn update_attrs(&self, old: Option<&VNode>, vnode: &VNode) {
        let Some(elm) = vnode.elm() else {
            return;
        };
        let empty = IndexMap::new();
        let old_attrs = old.and_then(VNode::data).map_or(&empty, |d| &d.attrs);
        let attrs = vnode.data().map_or(&empty, |d| &d.attrs);
        if old_attrs.is_empty() && attrs.is_empty() {
            return;
        }
        for (name, value) in attrs {
            if old_attrs.get(name).is_none_or(|old| !strict_equals(old, value)) {
                self.set_attr(elm, name, value);
            }
        }
        for name in old_attrs.keys() {
            if !attrs.contains_key(name) {
                self.host.remove_attribute(elm, name);
            }
        }
    }

    fn set_attr(&self, elm: fvue_vdom::NodeId, name: &str, value: &Value) {
        let falsy = value.is_nullish() || value.as_bool() == Some(false);
        if falsy {
            self.host.remove_attribute(elm, name);
        } else if BOOLEAN_ATTRS.contains(&name) {
            self.host.set_attribute(elm, name, name);
        } else {
            self.host.set_attribute(elm, name, &value.to_display_string());
        }
    }
}

impl Module for AttrsModule {
    fn name(&self) -> &'static str {
        "attrs"
    }

    fn create(&self, vnode: &VNode) {
        self.update_attrs(None, vnode);
    }

    fn update(&self, old: &VNode, vnode: &VNode) {
        self.update_attrs(Some(old), vnode);
    }
}

/// Host properties (`data.dom_props`). `textContent` and `innerHTML`
/// replace the element's children with a single text node.
#[derive(Debug)]
pub struct DomPropsModule {
    host: Rc<MemoryHost>,
}

impl DomPropsModule {
    #[must_use]
    pub fn new(host: Rc<MemoryHost>) -> Self {
        Self { host }
    }

    fn update_props(&self, old: Option<&VNode>, vnode: &VNode) {
        let Some(elm) = vnode.elm() else {
            return;
        };
        let empty = IndexMap::new();
        let old_props = old.and_then(VNode::data).map_or(&empty, |d| &d.dom_props);
        let props = vnode.data().map_or(&empty, |d| &d.dom_props);
        if old_props.is_empty() && props.is_empty() {
            return;
        }
        for name in old_props.keys() {
            if !props.contains_key(name) {
                self.host.set_property(elm, name, Value::string(""));
            }
        }
        for (name, value) in props {
            if name == "textContent" || name == "innerHTML" {
                if old_props.get(name).is_some_and(|old| strict_equals(old, value)) {
                    continue;
                }
                self.host.set_text_content(elm, &value.to_display_string());
                continue;
            }
            let value = if name == "value" {
                Value::string(value.to_display_string())
            } else {
                value.clone()
            };
            let current = self.host.prop(elm, name);
            if current.is_none_or(|c| !strict_equals(&c, &value)) {
                self.host.set_property(elm, name, value);
            }
        }
    }
}

impl Module for DomPropsModule {
    fn name(&self) -> &'static str {
        "dom-props"
    }

    fn create(&self, vnode: &VNode) {
        self.update_props(None, vnode);
    }

    fn update(&self, old: &VNode, vnode: &VNode) {
        self.update_props(Some(old), vnode);
    }
}

/// Host listeners (`data.on`). Invokers travel from the old node to the
/// new one, so a re-render with fresh closures costs no host operation.
#[derive(Debug)]
pub struct EventsModule {
    host: Rc<MemoryHost>,
}

impl EventsModule {
    #[must_use]
    pub fn new(host: Rc<MemoryHost>) -> Self {
        Self { host }
    }

    fn update_dom_listeners(&self, old: Option<&VNode>, vnode: &VNode) {
        let Some(elm) = vnode.elm() else {
            return;
        };
        let empty = On::new();
        let on = vnode.data().map_or(&empty, |d| &d.on);
        let mut bound: Invokers = old.map(VNode::take_invokers).unwrap_or_default();
        if on.is_empty() && bound.is_empty() {
            return;
        }
        let host = &self.host;
        update_listeners(
            on,
            &mut bound,
            |event, invoker| {
                host.add_listener(elm, &event.name, invoker.clone(), event.once, event.capture);
            },
            |event, invoker| host.remove_listener(elm, &event.name, invoker),
            None,
        );
        vnode.set_invokers(bound);
    }
}

impl Module for EventsModule {
    fn name(&self) -> &'static str {
        "events"
    }

    fn create(&self, vnode: &VNode) {
        self.update_dom_listeners(None, vnode);
    }

    fn update(&self, old: &VNode, vnode: &VNode) {
        self.update_dom_listeners(Some(old), vnode);
    }

    fn destroy(&self, vnode: &VNode) {
        let bound = vnode.take_invokers();
        let Some(elm) = vnode.elm() else {
            return;
        };
        for (raw, invoker) in bound {
            self.host
                .remove_listener(elm, &normalize_event(&raw).name, &invoker);
        }
    }
}

#[cfg(test)]
mod tests {
    use fvue_vdom::{OldNode, VNodeData};

    use super::*;

    fn paragraph(text: &str) -> VNode {
        VNode::element("p", Some(VNodeData::new().dom_prop("textContent", text)), Vec::new())
    }

    #[test]
    fn text_content_prop_replaces_children_only_when_changed() {
        let host = MemoryHost::new();
        let patcher = host.patcher();
        let first = paragraph("one");
        let elm = patcher.patch(None, Some(&first), false, false).unwrap().unwrap();
        assert_eq!(host.text(elm), "one");

        let same = paragraph("one");
        let _ = host.take_ops();
        patcher.patch(Some(OldNode::VNode(&first)), Some(&same), false, false).unwrap();
        assert!(host.ops().is_empty());

        let next = paragraph("two");
        patcher.patch(Some(OldNode::VNode(&same)), Some(&next), false, false).unwrap();
        assert_eq!(host.text(elm), "two");
    }
}
