#![forbid(unsafe_code)]

//! Arena-backed host nodes with an operation log.
//!
//! # Design
//!
//! Nodes live in a map keyed by [`NodeId`]; ids are never reused, so a
//! test can hold an id across patches and check that the same host node
//! survived a reorder. Every mutation through [`NodeOps`] (and through the
//! attribute/property/listener setters used by the modules) appends a
//! [`HostOp`] to the log.
//!
//! A document root is created with the host. Mount targets made with
//! [`MemoryHost::create_container`] hang off it, so replacing a mount
//! target has a parent to insert into.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;

use fvue_core::BoxError;
use fvue_reactive::{Value, tick};
use fvue_vdom::{HostNodeKind, Invoker, Module, NodeId, NodeOps, Patcher, VNode};
use indexmap::IndexMap;

use crate::modules::{AttrsModule, DomPropsModule, EventsModule};

/// One recorded host mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    CreateComment { node: NodeId, text: String },
    InsertBefore { parent: NodeId, node: NodeId, reference: NodeId },
    AppendChild { parent: NodeId, node: NodeId },
    RemoveChild { parent: NodeId, node: NodeId },
    SetText { node: NodeId, text: String },
    SetAttr { node: NodeId, name: String, value: String },
    RemoveAttr { node: NodeId, name: String },
    SetProp { node: NodeId, name: String, value: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
}

impl HostOp {
    /// True for operations that change tree structure.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InsertBefore { .. } | Self::AppendChild { .. } | Self::RemoveChild { .. }
        )
    }

    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateElement { .. } | Self::CreateText { .. } | Self::CreateComment { .. }
        )
    }
}

#[derive(Debug, Clone)]
enum Content {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        props: IndexMap<String, Value>,
    },
    Text(String),
    Comment(String),
}

struct BoundListener {
    event: String,
    once: bool,
    capture: bool,
    invoker: Invoker,
}

struct HostNode {
    content: Content,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<BoundListener>,
}

#[derive(Default)]
struct Arena {
    nodes: IndexMap<NodeId, HostNode>,
    ops: Vec<HostOp>,
}

/// In-memory host backend.
pub struct MemoryHost {
    arena: RefCell<Arena>,
    next_id: Cell<u64>,
    document: NodeId,
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("MemoryHost")
            .field("nodes", &arena.nodes.len())
            .field("ops", &arena.ops.len())
            .finish()
    }
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Rc<Self> {
        let host = Self {
            arena: RefCell::new(Arena::default()),
            next_id: Cell::new(1),
            document: NodeId(0),
        };
        host.arena.borrow_mut().nodes.insert(
            NodeId(0),
            HostNode {
                content: Content::Element {
                    tag: "#document".to_string(),
                    attrs: IndexMap::new(),
                    props: IndexMap::new(),
                },
                parent: None,
                children: Vec::new(),
                listeners: Vec::new(),
            },
        );
        Rc::new(host)
    }

    /// A patcher wired to this host with the attribute, property and
    /// listener modules, in that order.
    #[must_use]
    pub fn patcher(self: &Rc<Self>) -> Patcher {
        let modules: Vec<Rc<dyn Module>> = vec![
            Rc::new(AttrsModule::new(Rc::clone(self))),
            Rc::new(DomPropsModule::new(Rc::clone(self))),
            Rc::new(EventsModule::new(Rc::clone(self))),
        ];
        Patcher::new(Rc::clone(self) as Rc<dyn NodeOps>, modules)
    }

    #[must_use]
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// Create `<div id="{id}">` under the document root, without logging.
    pub fn create_container(&self, id: &str) -> NodeId {
        let node = self.alloc(Content::Element {
            tag: "div".to_string(),
            attrs: IndexMap::from([("id".to_string(), id.to_string())]),
            props: IndexMap::new(),
        });
        self.attach(self.document, node, None);
        node
    }

    /// Parse-free construction of server-rendered content for hydration
    /// tests: create an element under `parent` without logging.
    pub fn seed_element(&self, parent: NodeId, tag: &str) -> NodeId {
        let node = self.alloc(Content::Element {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
            props: IndexMap::new(),
        });
        self.attach(parent, node, None);
        node
    }

    pub fn seed_text(&self, parent: NodeId, text: &str) -> NodeId {
        let node = self.alloc(Content::Text(text.to_string()));
        self.attach(parent, node, None);
        node
    }

    // ─── Inspection ─────────────────────────────────────────────────────

    #[must_use]
    pub fn ops(&self) -> Vec<HostOp> {
        self.arena.borrow().ops.clone()
    }

    /// Return and clear the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.arena.borrow_mut().ops)
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.arena.borrow().nodes.contains_key(&node)
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.content {
            Content::Element { attrs, .. } => attrs.get(name).cloned(),
            _ => None,
        }
    }

    #[must_use]
    pub fn prop(&self, node: NodeId, name: &str) -> Option<Value> {
        match &self.arena.borrow().nodes.get(&node)?.content {
            Content::Element { props, .. } => props.get(name).cloned(),
            _ => None,
        }
    }

    #[must_use]
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.arena
            .borrow()
            .nodes
            .get(&node)
            .map_or(0, |n| n.listeners.len())
    }

    /// Concatenated text of a subtree.
    #[must_use]
    pub fn text(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        collect_text(&arena, node, &mut out);
        out
    }

    /// Serialize a node and its subtree.
    #[must_use]
    pub fn html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        write_html(&arena, node, &mut out);
        out
    }

    /// Serialize the children of a node.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        if let Some(n) = arena.nodes.get(&node) {
            for child in &n.children {
                write_html(&arena, *child, &mut out);
            }
        }
        out
    }

    /// First descendant element (depth-first) with the given tag.
    #[must_use]
    pub fn find_tag(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        let arena = self.arena.borrow();
        find(&arena, root, &|c| matches!(c, Content::Element { tag: t, .. } if t == tag))
    }

    /// Element with the given `id` attribute.
    #[must_use]
    pub fn find_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        let arena = self.arena.borrow();
        find(&arena, root, &|c| {
            matches!(c, Content::Element { attrs, .. } if attrs.get("id").is_some_and(|v| v == id))
        })
    }

    // ─── Events ─────────────────────────────────────────────────────────

    /// Deliver `event` to the listeners bound on `node`.
    ///
    /// Handlers run with next-tick flushes routed to the macrotask queue.
    /// Every listener runs; the first failure is returned.
    pub fn dispatch(&self, node: NodeId, event: &str, args: &[Value]) -> Result<(), BoxError> {
        let targets: Vec<(Invoker, bool)> = {
            let mut arena = self.arena.borrow_mut();
            let Some(n) = arena.nodes.get_mut(&node) else {
                return Ok(());
            };
            let mut targets: Vec<(Invoker, bool)> = n
                .listeners
                .iter()
                .filter(|l| l.event == event)
                .map(|l| (l.invoker.clone(), l.capture))
                .collect();
            // Capture listeners fire first.
            targets.sort_by_key(|(_, capture)| !*capture);
            n.listeners.retain(|l| !(l.once && l.event == event));
            targets
        };
        tracing::trace!(%node, event, listeners = targets.len(), "dispatch");
        let mut first_error = None;
        for (invoker, _) in targets {
            if let Err(err) = tick::with_macro_task(|| invoker.invoke(args)) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ─── Module-facing setters ──────────────────────────────────────────

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut arena = self.arena.borrow_mut();
        if let Some(Content::Element { attrs, .. }) = arena.nodes.get_mut(&node).map(|n| &mut n.content) {
            attrs.insert(name.to_string(), value.to_string());
        }
        arena.ops.push(HostOp::SetAttr {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let mut arena = self.arena.borrow_mut();
        if let Some(Content::Element { attrs, .. }) = arena.nodes.get_mut(&node).map(|n| &mut n.content) {
            attrs.shift_remove(name);
        }
        arena.ops.push(HostOp::RemoveAttr {
            node,
            name: name.to_string(),
        });
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: Value) {
        let rendered = value.to_display_string();
        let mut arena = self.arena.borrow_mut();
        if let Some(Content::Element { props, .. }) = arena.nodes.get_mut(&node).map(|n| &mut n.content) {
            props.insert(name.to_string(), value);
        }
        arena.ops.push(HostOp::SetProp {
            node,
            name: name.to_string(),
            value: rendered,
        });
    }

    pub fn add_listener(&self, node: NodeId, event: &str, invoker: Invoker, once: bool, capture: bool) {
        let mut arena = self.arena.borrow_mut();
        if let Some(n) = arena.nodes.get_mut(&node) {
            n.listeners.push(BoundListener {
                event: event.to_string(),
                once,
                capture,
                invoker,
            });
        }
        arena.ops.push(HostOp::AddListener {
            node,
            event: event.to_string(),
        });
    }

    pub fn remove_listener(&self, node: NodeId, event: &str, invoker: &Invoker) {
        let mut arena = self.arena.borrow_mut();
        if let Some(n) = arena.nodes.get_mut(&node) {
            n.listeners
                .retain(|l| !(l.event == event && l.invoker == *invoker));
        }
        arena.ops.push(HostOp::RemoveListener {
            node,
            event: event.to_string(),
        });
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn alloc(&self, content: Content) -> NodeId {
        let id = NodeId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.arena.borrow_mut().nodes.insert(
            id,
            HostNode {
                content,
                parent: None,
                children: Vec::new(),
                listeners: Vec::new(),
            },
        );
        id
    }

    fn detach(arena: &mut Arena, node: NodeId) {
        let Some(parent) = arena.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = arena.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
    }

    fn attach(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        let mut arena = self.arena.borrow_mut();
        Self::detach(&mut arena, node);
        let Some(p) = arena.nodes.get_mut(&parent) else {
            return;
        };
        let at = reference
            .and_then(|r| p.children.iter().position(|c| *c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, node);
        if let Some(n) = arena.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
    }

    fn log(&self, op: HostOp) {
        self.arena.borrow_mut().ops.push(op);
    }
}

impl NodeOps for MemoryHost {
    fn create_element(&self, tag: &str, _vnode: &VNode) -> NodeId {
        let node = self.alloc(Content::Element {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
            props: IndexMap::new(),
        });
        self.log(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text_node(&self, text: &str) -> NodeId {
        let node = self.alloc(Content::Text(text.to_string()));
        self.log(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn create_comment(&self, text: &str) -> NodeId {
        let node = self.alloc(Content::Comment(text.to_string()));
        self.log(HostOp::CreateComment {
            node,
            text: text.to_string(),
        });
        node
    }

    fn insert_before(&self, parent: NodeId, node: NodeId, reference: NodeId) {
        self.attach(parent, node, Some(reference));
        self.log(HostOp::InsertBefore {
            parent,
            node,
            reference,
        });
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) {
        {
            let mut arena = self.arena.borrow_mut();
            if arena.nodes.get(&child).and_then(|n| n.parent) == Some(parent) {
                Self::detach(&mut arena, child);
            }
        }
        self.log(HostOp::RemoveChild {
            parent,
            node: child,
        });
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, None);
        self.log(HostOp::AppendChild {
            parent,
            node: child,
        });
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        let parent = arena.nodes.get(&node)?.parent?;
        let siblings = &arena.nodes.get(&parent)?.children;
        let at = siblings.iter().position(|c| *c == node)?;
        siblings.get(at + 1).copied()
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(&node)?.children.first().copied()
    }

    fn kind(&self, node: NodeId) -> Option<HostNodeKind> {
        Some(match &self.arena.borrow().nodes.get(&node)?.content {
            Content::Element { tag, .. } => HostNodeKind::Element(tag.clone()),
            Content::Text(_) => HostNodeKind::Text,
            Content::Comment(_) => HostNodeKind::Comment,
        })
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.content {
            Content::Text(text) | Content::Comment(text) => Some(text.clone()),
            Content::Element { .. } => None,
        }
    }

    fn set_text_content(&self, node: NodeId, text: &str) {
        {
            let mut arena = self.arena.borrow_mut();
            let is_element = match arena.nodes.get_mut(&node).map(|n| &mut n.content) {
                Some(Content::Text(current) | Content::Comment(current)) => {
                    *current = text.to_string();
                    false
                }
                Some(Content::Element { .. }) => true,
                None => false,
            };
            if is_element {
                let old = arena
                    .nodes
                    .get_mut(&node)
                    .map(|n| std::mem::take(&mut n.children))
                    .unwrap_or_default();
                for child in old {
                    if let Some(c) = arena.nodes.get_mut(&child) {
                        c.parent = None;
                    }
                }
            }
        }
        let is_element = matches!(self.kind(node), Some(HostNodeKind::Element(_)));
        if is_element && !text.is_empty() {
            let child = self.alloc(Content::Text(text.to_string()));
            self.attach(node, child, None);
        }
        self.log(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }
}

fn collect_text(arena: &Arena, node: NodeId, out: &mut String) {
    let Some(n) = arena.nodes.get(&node) else {
        return;
    };
    match &n.content {
        Content::Text(text) => out.push_str(text),
        Content::Comment(_) => {}
        Content::Element { .. } => {
            for child in &n.children {
                collect_text(arena, *child, out);
            }
        }
    }
}

fn write_html(arena: &Arena, node: NodeId, out: &mut String) {
    let Some(n) = arena.nodes.get(&node) else {
        return;
    };
    match &n.content {
        Content::Text(text) => out.push_str(text),
        Content::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Content::Element { tag, attrs, .. } => {
            let _ = write!(out, "<{tag}");
            for (name, value) in attrs {
                if value.is_empty() {
                    let _ = write!(out, " {name}");
                } else {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
            }
            out.push('>');
            for child in &n.children {
                write_html(arena, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn find(arena: &Arena, node: NodeId, pred: &dyn Fn(&Content) -> bool) -> Option<NodeId> {
    let n = arena.nodes.get(&node)?;
    for child in &n.children {
        let c = arena.nodes.get(child)?;
        if pred(&c.content) {
            return Some(*child);
        }
        if let Some(found) = find(arena, *child, pred) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(host: &MemoryHost, tag: &str) -> NodeId {
        let vnode = VNode::element(tag, None, Vec::new());
        host.create_element(tag, &vnode)
    }

    #[test]
    fn insert_before_moves_existing_child() {
        let host = MemoryHost::new();
        let root = host.create_container("app");
        let (a, b, c) = (el(&host, "a"), el(&host, "b"), el(&host, "c"));
        for n in [a, b, c] {
            host.append_child(root, n);
        }
        host.insert_before(root, c, a);
        assert_eq!(host.children(root), vec![c, a, b]);
        assert_eq!(host.next_sibling(c), Some(a));
        assert_eq!(host.html(root), "<div id=\"app\"><c></c><a></a><b></b></div>");
    }

    #[test]
    fn set_text_content_replaces_element_children() {
        let host = MemoryHost::new();
        let root = host.create_container("app");
        let p = el(&host, "p");
        host.append_child(root, p);
        let t = host.create_text_node("old");
        host.append_child(p, t);
        host.set_text_content(p, "new");
        assert_eq!(host.text(p), "new");
        assert_eq!(host.parent_node(t), None);
        host.set_text_content(t, "x");
        assert_eq!(host.text_content(t).as_deref(), Some("x"));
    }

    #[test]
    fn dispatch_runs_listeners_and_drops_once() {
        use std::cell::Cell;
        let host = MemoryHost::new();
        let button = el(&host, "button");
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let invoker = Invoker::new(vec![Rc::new(move |_: &[Value]| {
            h.set(h.get() + 1);
            Ok(())
        })]);
        host.add_listener(button, "click", invoker, true, false);
        host.dispatch(button, "click", &[]).unwrap();
        host.dispatch(button, "click", &[]).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(host.listener_count(button), 0);
    }

    #[test]
    fn op_log_records_structure() {
        let host = MemoryHost::new();
        let root = host.create_container("app");
        assert!(host.ops().is_empty(), "containers are not logged");
        let a = el(&host, "a");
        host.append_child(root, a);
        host.remove_child(root, a);
        let ops = host.take_ops();
        assert!(ops[0].is_create());
        assert_eq!(ops.iter().filter(|o| o.is_structural()).count(), 2);
        assert!(host.ops().is_empty());
    }
}
