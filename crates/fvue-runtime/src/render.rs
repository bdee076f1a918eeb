#![forbid(unsafe_code)]

//! Render functions and the helpers they are given.
//!
//! A render function receives a [`RenderContext`] and returns the root
//! [`VNode`] of the instance's next tree. The context resolves tags to
//! elements or registered components, exposes slot content and caches
//! static subtrees.
//!
//! # Invariants
//!
//! 1. A static subtree is built once per instance and reused as the same
//!    node on every render.
//! 2. The root of every rendered tree points at the instance's placeholder.
//!
//! # Failure Modes
//!
//! - **Render function fails**: reported as `"render"`; the previous tree
//!   (or an empty node on first render) is used instead.
//! - **No render function and no compiler**: warned once at mount; the
//!   instance renders an empty node.

use std::rc::Rc;

use fvue_core::{BoxError, config, debug, error::boxed, handle_error};
use fvue_reactive::{Obj, Value};
use fvue_vdom::{Listener, VNode, VNodeData};
use indexmap::IndexMap;

use crate::compiler::{CompilerOptions, compile_cached};
use crate::component_vnode::create_component;
use crate::error::Result;
use crate::global;
use crate::instance::Instance;
use crate::options::{Component, RenderFn};
use crate::util::{capitalize, camelize, resolve_asset};

/// What a render function builds its tree with.
pub struct RenderContext<'a> {
    vm: &'a Instance,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(vm: &'a Instance) -> Self {
        Self { vm }
    }

    #[must_use]
    pub fn vm(&self) -> &Instance {
        self.vm
    }

    /// Shorthand for [`Instance::get`].
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.vm.get(key)
    }

    pub fn try_get(&self, key: &str) -> Result<Value> {
        self.vm.try_get(key)
    }

    #[must_use]
    pub fn get_path(&self, path: &str) -> Value {
        self.vm.get_path(path)
    }

    /// An element, or a component when `tag` names one registered on the
    /// instance (locally, globally, or the instance's own definition).
    #[must_use]
    pub fn h(&self, tag: &str, data: Option<VNodeData>, children: Vec<VNode>) -> VNode {
        if tag.is_empty() {
            return VNode::empty();
        }
        if config::is_reserved_tag(tag) {
            return VNode::element(tag, data, children);
        }
        if let Some(component) = self.resolve_component(tag) {
            return create_component(&component, data, self.vm, children, Some(tag));
        }
        if is_unknown_element(tag) {
            debug::warn(
                &format!(
                    "Unknown custom element: <{tag}> - did you register the component \
                     correctly? For recursive components, make sure to provide the \"name\" option."
                ),
                Some(self.vm.scope()),
            );
        }
        VNode::element(tag, data, children)
    }

    /// A node for `component` without going through name resolution.
    #[must_use]
    pub fn component(
        &self,
        component: impl Into<Component>,
        data: Option<VNodeData>,
        children: Vec<VNode>,
    ) -> VNode {
        create_component(&component.into(), data, self.vm, children, None)
    }

    #[must_use]
    pub fn text(&self, text: impl AsRef<str>) -> VNode {
        VNode::text(text)
    }

    #[must_use]
    pub fn empty(&self) -> VNode {
        VNode::empty()
    }

    /// Content of slot `name`, empty when not provided.
    #[must_use]
    pub fn slot(&self, name: &str) -> Vec<VNode> {
        self.vm.slot_nodes(name)
    }

    /// Content for slot `name`: the scoped slot called with `props` when
    /// the parent supplied one, else the plain slot, else `fallback`.
    pub fn render_slot(
        &self,
        name: &str,
        fallback: Vec<VNode>,
        props: Option<Obj>,
    ) -> std::result::Result<Vec<VNode>, BoxError> {
        let scoped = self.vm.0.scoped_slots.borrow().get(name).cloned();
        if let Some(scoped) = scoped {
            let nodes = scoped(&props.unwrap_or_default())?;
            return Ok(if nodes.is_empty() { fallback } else { nodes });
        }
        let nodes = self.vm.slot_nodes(name);
        Ok(if nodes.is_empty() { fallback } else { nodes })
    }

    /// Static subtree `index`, built on first use and cached.
    pub fn static_tree(&self, index: usize) -> std::result::Result<VNode, BoxError> {
        let cached = self.vm.0.static_trees.borrow().get(index).cloned().flatten();
        if let Some(tree) = cached {
            return Ok(tree);
        }
        let fns = static_render_fns(self.vm);
        let Some(render) = fns.get(index) else {
            return Err(boxed(format!("static render function {index} is not defined")));
        };
        let tree = render(self)?;
        tree.mark_static();
        let mut trees = self.vm.0.static_trees.borrow_mut();
        if trees.len() <= index {
            trees.resize(index + 1, None);
        }
        trees[index] = Some(tree.clone());
        Ok(tree)
    }

    /// A listener running `handler` against this instance.
    #[must_use]
    pub fn listener(
        &self,
        handler: impl Fn(&Instance, &[Value]) -> std::result::Result<(), BoxError> + 'static,
    ) -> Listener {
        let weak = self.vm.downgrade();
        Rc::new(move |args: &[Value]| match weak.upgrade() {
            Some(vm) => handler(&vm, args),
            None => Ok(()),
        })
    }

    /// A listener calling method `name` with the event arguments.
    #[must_use]
    pub fn method_listener(&self, name: &str) -> Listener {
        let name = name.to_string();
        self.listener(move |vm, args| {
            vm.call(&name, args)?;
            Ok(())
        })
    }

    fn resolve_component(&self, tag: &str) -> Option<Component> {
        let options = self.vm.options();
        if let Some(found) = resolve_asset(&options.components, tag) {
            return Some(found.clone());
        }
        let own = self.vm.definition();
        let own_name = own.name()?;
        let camelized = camelize(tag);
        let matches_own =
            own_name == tag || own_name == camelized || own_name == capitalize(&camelized);
        matches_own.then(|| Component::Def(own.clone()))
    }
}

fn is_unknown_element(tag: &str) -> bool {
    !config::is_ignored_element(tag)
        && (tag.contains('-') || tag.chars().next().is_some_and(char::is_uppercase))
}

// ─── Render pass ────────────────────────────────────────────────────────

/// Resolve the render function at mount: the declared one, or a compiled
/// template.
pub(crate) fn ensure_render(vm: &Instance) {
    if vm.options().render.is_some() {
        return;
    }
    let Some(template) = vm.options().template.clone() else {
        debug::warn(
            "Failed to mount component: template or render function not defined.",
            Some(vm.scope()),
        );
        return;
    };
    let Some(compiler) = global::compiler() else {
        debug::warn(
            "You are using the runtime-only build where the template compiler is not \
             available. Either pre-compile the templates into render functions, or register \
             a compiler with global::set_compiler.",
            Some(vm.scope()),
        );
        return;
    };
    let options = CompilerOptions {
        delimiters: vm.options().delimiters.clone(),
        preserve_whitespace: true,
        is_reserved_tag: Rc::new(config::is_reserved_tag),
    };
    let compiled = compile_cached(&*compiler, &template, &options);
    if !compiled.errors.is_empty() {
        let listed: Vec<String> = compiled.errors.iter().map(|e| format!("- {e}")).collect();
        debug::warn(
            &format!("Error compiling template:\n\n{template}\n\n{}\n", listed.join("\n")),
            Some(vm.scope()),
        );
    }
    for tip in &compiled.tips {
        debug::tip(tip, Some(vm.scope()));
    }
    *vm.0.compiled.borrow_mut() = Some(compiled);
}

fn render_fn(vm: &Instance) -> Option<RenderFn> {
    vm.options()
        .render
        .clone()
        .or_else(|| vm.0.compiled.borrow().as_ref().map(|c| Rc::clone(&c.render)))
}

fn static_render_fns(vm: &Instance) -> Vec<RenderFn> {
    if !vm.options().static_render_fns.is_empty() {
        return vm.options().static_render_fns.clone();
    }
    vm.0.compiled
        .borrow()
        .as_ref()
        .map(|c| c.static_render_fns.clone())
        .unwrap_or_default()
}

/// Run the instance's render function and stamp the result.
pub(crate) fn render_vnode(vm: &Instance) -> VNode {
    let placeholder = vm.parent_vnode();
    let scoped = placeholder
        .as_ref()
        .and_then(|p| p.data().map(|d| d.scoped_slots.clone()))
        .unwrap_or_default();
    *vm.0.scoped_slots.borrow_mut() = scoped;

    let _span = config::performance()
        .then(|| tracing::debug_span!("fvue.render", component = %vm.display_name()).entered());
    let ctx = RenderContext::new(vm);
    let result = match render_fn(vm) {
        Some(render) => render(&ctx),
        None => Ok(VNode::empty()),
    };
    let vnode = match result {
        Ok(vnode) => vnode,
        Err(err) => {
            handle_error(err, Some(vm.scope()), "render");
            vm.vnode().unwrap_or_else(VNode::empty)
        }
    };
    vnode.set_parent(placeholder.as_ref());
    vnode
}

// ─── Slots ──────────────────────────────────────────────────────────────

/// Group raw children by their `slot` name (`"default"` when unnamed).
/// Slots holding only whitespace text and comments are dropped.
pub(crate) fn resolve_slots(children: &[VNode]) -> IndexMap<String, Vec<VNode>> {
    let mut slots: IndexMap<String, Vec<VNode>> = IndexMap::new();
    for child in children {
        let name = child
            .data()
            .and_then(|d| d.slot.clone())
            .unwrap_or_else(|| "default".to_string());
        slots.entry(name).or_default().push(child.clone());
    }
    slots.retain(|_, nodes| !nodes.iter().all(is_whitespace));
    slots
}

fn is_whitespace(node: &VNode) -> bool {
    (node.is_comment() && !node.is_async_placeholder())
        || (node.is_text() && node.text_content() == Some(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_group_by_name() {
        let children = vec![
            VNode::text("a"),
            VNode::element("p", Some(VNodeData::new().slot("header")), vec![]),
            VNode::text("b"),
        ];
        let slots = resolve_slots(&children);
        assert_eq!(slots["default"].len(), 2);
        assert_eq!(slots["header"].len(), 1);
    }

    #[test]
    fn whitespace_only_slots_are_dropped() {
        let children = vec![
            VNode::text(" "),
            VNode::comment("x"),
            VNode::element("p", Some(VNodeData::new().slot("footer")), vec![]),
        ];
        let slots = resolve_slots(&children);
        assert!(!slots.contains_key("default"));
        assert!(slots.contains_key("footer"));
    }

    #[test]
    fn unknown_element_detection() {
        assert!(is_unknown_element("my-widget"));
        assert!(is_unknown_element("Widget"));
        assert!(!is_unknown_element("div"));
    }
}
