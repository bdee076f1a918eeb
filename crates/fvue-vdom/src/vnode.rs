#![forbid(unsafe_code)]

//! The virtual node model.
//!
//! A [`VNode`] is produced by a render pass and describes one position of
//! the output tree. Its shape (kind, data, children) is fixed once built;
//! the patcher records on it which host node realizes it and, for
//! component-typed nodes, which instance backs it.
//!
//! # Invariants
//!
//! 1. `elm` is set once the node has been realized by the patcher.
//! 2. A component-typed node has `component_instance` set after its `init`
//!    hook ran, and its `elm` equals that instance's root host node.
//! 3. The root node of a component render has `parent` pointing (weakly) at
//!    the placeholder node in the parent's tree.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use fvue_core::BoxError;
use fvue_reactive::{Obj, Value};
use indexmap::IndexMap;

use crate::component::{AsyncPlaceholder, ComponentCtor, ComponentHandle, ComponentHooks};
use crate::host::NodeId;
use crate::listeners::Invokers;

/// One event handler.
pub type Listener = Rc<dyn Fn(&[Value]) -> Result<(), BoxError>>;

/// Event name (possibly carrying modifier prefixes) to handlers.
pub type On = IndexMap<String, Vec<Listener>>;

/// A slot rendered lazily with props from the child.
pub type ScopedSlotFn = Rc<dyn Fn(&Obj) -> Result<Vec<VNode>, BoxError>>;

/// Reconciliation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<usize> for Key {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Per-node metadata consumed by host modules and component creation.
#[derive(Clone, Default)]
pub struct VNodeData {
    pub key: Option<Key>,
    pub attrs: IndexMap<String, Value>,
    pub dom_props: IndexMap<String, Value>,
    /// Listeners. On a component placeholder these are native host
    /// listeners bound to the component's root node.
    pub on: On,
    /// Native listeners requested on a component tag. Moved into `on`
    /// when the component node is built.
    pub native_on: On,
    /// Prop bindings on a component tag.
    pub props: IndexMap<String, Value>,
    /// Named slot this node is passed into.
    pub slot: Option<String>,
    pub scoped_slots: IndexMap<String, ScopedSlotFn>,
}

impl fmt::Debug for VNodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNodeData")
            .field("key", &self.key)
            .field("attrs", &self.attrs)
            .field("dom_props", &self.dom_props)
            .field("on", &self.on.keys().collect::<Vec<_>>())
            .field("props", &self.props)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl VNodeData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn dom_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.dom_props.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn on(
        mut self,
        event: impl Into<String>,
        handler: impl Fn(&[Value]) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.on.entry(event.into()).or_default().push(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn native_on(
        mut self,
        event: impl Into<String>,
        handler: impl Fn(&[Value]) -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.native_on
            .entry(event.into())
            .or_default()
            .push(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slot = Some(name.into());
        self
    }

    #[must_use]
    pub fn scoped_slot(
        mut self,
        name: impl Into<String>,
        render: impl Fn(&Obj) -> Result<Vec<VNode>, BoxError> + 'static,
    ) -> Self {
        self.scoped_slots.insert(name.into(), Rc::new(render));
        self
    }
}

/// Everything needed to create or update a child component from a
/// placeholder node.
#[derive(Clone)]
pub struct ComponentVNodeOptions {
    pub ctor: Rc<dyn ComponentCtor>,
    /// Resolved prop values keyed by declared prop name.
    pub props_data: Obj,
    /// Component-level (non-native) listeners.
    pub listeners: On,
    /// Tag name as written in the parent template.
    pub tag: Option<String>,
    /// Unresolved slot content.
    pub children: Vec<VNode>,
    pub hooks: Rc<dyn ComponentHooks>,
}

impl fmt::Debug for ComponentVNodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentVNodeOptions")
            .field("cid", &self.ctor.cid())
            .field("name", &self.ctor.name())
            .field("tag", &self.tag)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum VNodeKind {
    Element { tag: Rc<str> },
    Text { text: Rc<str> },
    /// Comment node. An empty comment is the placeholder rendered where
    /// nothing is to be shown.
    Comment { text: Rc<str> },
    Component(ComponentVNodeOptions),
}

pub(crate) struct VNodeInner {
    kind: VNodeKind,
    data: Option<VNodeData>,
    children: RefCell<Option<Vec<VNode>>>,
    elm: Cell<Option<NodeId>>,
    component_instance: RefCell<Option<Rc<dyn ComponentHandle>>>,
    parent: RefCell<Weak<VNodeInner>>,
    pending_insert: RefCell<Option<Vec<VNode>>>,
    keep_alive: Cell<bool>,
    is_static: Cell<bool>,
    is_root_insert: Cell<bool>,
    async_factory: Option<Rc<dyn AsyncPlaceholder>>,
    is_async_placeholder: Cell<bool>,
    /// Listener invokers bound to `elm` for this node.
    invokers: RefCell<Invokers>,
}

/// Shared handle to a virtual node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeInner>);

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("kind", &self.0.kind);
        if let Some(key) = self.key() {
            s.field("key", key);
        }
        if let Some(elm) = self.elm() {
            s.field("elm", &elm);
        }
        if let Some(children) = &*self.0.children.borrow() {
            s.field("children", children);
        }
        s.finish()
    }
}

impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Non-owning handle to a [`VNode`].
#[derive(Clone, Default)]
pub struct WeakVNode(Weak<VNodeInner>);

impl fmt::Debug for WeakVNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.strong_count() > 0 { "WeakVNode" } else { "WeakVNode(dropped)" })
    }
}

impl WeakVNode {
    #[must_use]
    pub fn upgrade(&self) -> Option<VNode> {
        self.0.upgrade().map(VNode)
    }
}

impl VNode {
    fn build(kind: VNodeKind, data: Option<VNodeData>, children: Option<Vec<VNode>>) -> Self {
        Self::build_with(kind, data, children, None)
    }

    fn build_with(
        kind: VNodeKind,
        data: Option<VNodeData>,
        children: Option<Vec<VNode>>,
        async_factory: Option<Rc<dyn AsyncPlaceholder>>,
    ) -> Self {
        Self(Rc::new(VNodeInner {
            kind,
            data,
            children: RefCell::new(children),
            elm: Cell::new(None),
            component_instance: RefCell::new(None),
            parent: RefCell::new(Weak::new()),
            pending_insert: RefCell::new(None),
            keep_alive: Cell::new(false),
            is_static: Cell::new(false),
            is_root_insert: Cell::new(true),
            async_factory,
            is_async_placeholder: Cell::new(false),
            invokers: RefCell::new(Invokers::new()),
        }))
    }

    #[must_use]
    pub fn element(tag: &str, data: Option<VNodeData>, children: Vec<VNode>) -> Self {
        Self::build(
            VNodeKind::Element { tag: Rc::from(tag) },
            data,
            Some(children),
        )
    }

    #[must_use]
    pub fn text(text: impl AsRef<str>) -> Self {
        Self::build(
            VNodeKind::Text {
                text: Rc::from(text.as_ref()),
            },
            None,
            None,
        )
    }

    #[must_use]
    pub fn comment(text: impl AsRef<str>) -> Self {
        Self::build(
            VNodeKind::Comment {
                text: Rc::from(text.as_ref()),
            },
            None,
            None,
        )
    }

    /// The node rendered where there is nothing to show.
    #[must_use]
    pub fn empty() -> Self {
        Self::comment("")
    }

    /// A component placeholder. Component nodes always carry data.
    #[must_use]
    pub fn component(options: ComponentVNodeOptions, data: VNodeData) -> Self {
        Self::build(VNodeKind::Component(options), Some(data), None)
    }

    /// Empty placeholder standing in for an unresolved async component.
    #[must_use]
    pub fn async_placeholder(factory: Rc<dyn AsyncPlaceholder>, data: Option<VNodeData>) -> Self {
        Self::build_with(
            VNodeKind::Comment { text: Rc::from("") },
            data,
            None,
            Some(factory),
        )
    }

    /// Shallow copy with a fresh identity: same shape, not yet realized.
    #[must_use]
    pub fn clone_node(&self) -> Self {
        Self(Rc::new(VNodeInner {
            kind: self.0.kind.clone(),
            data: self.0.data.clone(),
            children: RefCell::new(self.0.children.borrow().clone()),
            elm: Cell::new(None),
            component_instance: RefCell::new(None),
            parent: RefCell::new(Weak::new()),
            pending_insert: RefCell::new(None),
            keep_alive: Cell::new(self.0.keep_alive.get()),
            is_static: Cell::new(self.0.is_static.get()),
            is_root_insert: Cell::new(true),
            async_factory: self.0.async_factory.clone(),
            is_async_placeholder: Cell::new(false),
            invokers: RefCell::new(Invokers::new()),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> &VNodeKind {
        &self.0.kind
    }

    #[must_use]
    pub fn data(&self) -> Option<&VNodeData> {
        self.0.data.as_ref()
    }

    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.0.data.as_ref().and_then(|d| d.key.as_ref())
    }

    /// Element tag, or `None` for text, comment and component nodes.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    /// Text of a text or comment node.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Text { text } | VNodeKind::Comment { text } => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_comment(&self) -> bool {
        matches!(self.0.kind, VNodeKind::Comment { .. })
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, VNodeKind::Text { .. })
    }

    /// True for elements and component placeholders.
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        matches!(
            self.0.kind,
            VNodeKind::Element { .. } | VNodeKind::Component(_)
        )
    }

    #[must_use]
    pub fn component_options(&self) -> Option<&ComponentVNodeOptions> {
        match &self.0.kind {
            VNodeKind::Component(options) => Some(options),
            _ => None,
        }
    }

    /// Snapshot of the child list.
    #[must_use]
    pub fn children(&self) -> Option<Vec<VNode>> {
        self.0.children.borrow().clone()
    }

    pub(crate) fn replace_child(&self, index: usize, child: VNode) {
        if let Some(children) = &mut *self.0.children.borrow_mut() {
            if let Some(slot) = children.get_mut(index) {
                *slot = child;
            }
        }
    }

    #[must_use]
    pub fn elm(&self) -> Option<NodeId> {
        self.0.elm.get()
    }

    pub fn set_elm(&self, elm: Option<NodeId>) {
        self.0.elm.set(elm);
    }

    #[must_use]
    pub fn component_instance(&self) -> Option<Rc<dyn ComponentHandle>> {
        self.0.component_instance.borrow().clone()
    }

    pub fn set_component_instance(&self, instance: Option<Rc<dyn ComponentHandle>>) {
        *self.0.component_instance.borrow_mut() = instance;
    }

    /// Placeholder node in the parent tree, for a component's root node.
    #[must_use]
    pub fn parent(&self) -> Option<VNode> {
        self.0.parent.borrow().upgrade().map(VNode)
    }

    pub fn set_parent(&self, parent: Option<&VNode>) {
        *self.0.parent.borrow_mut() = parent.map_or_else(Weak::new, |p| Rc::downgrade(&p.0));
    }

    pub(crate) fn take_pending_insert(&self) -> Option<Vec<VNode>> {
        self.0.pending_insert.borrow_mut().take()
    }

    pub(crate) fn set_pending_insert(&self, queue: Vec<VNode>) {
        *self.0.pending_insert.borrow_mut() = Some(queue);
    }

    /// Whether this placeholder is managed by a keep-alive cache.
    #[must_use]
    pub fn keep_alive(&self) -> bool {
        self.0.keep_alive.get()
    }

    pub fn set_keep_alive(&self, keep_alive: bool) {
        self.0.keep_alive.set(keep_alive);
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.0.is_static.get()
    }

    /// Mark as part of a cached static tree.
    pub fn mark_static(&self) {
        self.0.is_static.set(true);
        if let Some(children) = &*self.0.children.borrow() {
            for child in children {
                child.mark_static();
            }
        }
    }

    #[must_use]
    pub fn is_root_insert(&self) -> bool {
        self.0.is_root_insert.get()
    }

    pub(crate) fn set_root_insert(&self, root: bool) {
        self.0.is_root_insert.set(root);
    }

    #[must_use]
    pub fn async_factory(&self) -> Option<&Rc<dyn AsyncPlaceholder>> {
        self.0.async_factory.as_ref()
    }

    #[must_use]
    pub fn is_async_placeholder(&self) -> bool {
        self.0.is_async_placeholder.get()
    }

    pub(crate) fn set_async_placeholder(&self, value: bool) {
        self.0.is_async_placeholder.set(value);
    }

    /// Hand the bound invokers over (to the node replacing this one).
    pub fn take_invokers(&self) -> Invokers {
        std::mem::take(&mut *self.0.invokers.borrow_mut())
    }

    pub fn set_invokers(&self, invokers: Invokers) {
        *self.0.invokers.borrow_mut() = invokers;
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakVNode {
        WeakVNode(Rc::downgrade(&self.0))
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_shape() {
        let node = VNode::element(
            "li",
            Some(VNodeData::new().key("a").attr("id", "x")),
            vec![VNode::text("hi")],
        );
        assert_eq!(node.tag(), Some("li"));
        assert_eq!(node.key(), Some(&Key::from("a")));
        assert!(node.is_tagged());
        let children = node.children().unwrap();
        assert_eq!(children[0].text_content(), Some("hi"));
        assert!(VNode::empty().is_comment());
        assert!(VNode::text("t").children().is_none());
    }

    #[test]
    fn clone_node_is_a_new_unrealized_identity() {
        let node = VNode::element("p", None, vec![VNode::text("x")]);
        node.set_elm(Some(NodeId(7)));
        let copy = node.clone_node();
        assert!(!copy.ptr_eq(&node));
        assert_eq!(copy.elm(), None);
        assert_eq!(copy.children().unwrap().len(), 1);
    }

    #[test]
    fn parent_link_is_weak() {
        let root = VNode::element("div", None, vec![]);
        {
            let placeholder = VNode::element("span", None, vec![]);
            root.set_parent(Some(&placeholder));
            assert!(root.parent().is_some());
        }
        assert!(root.parent().is_none());
    }

    #[test]
    fn mark_static_is_recursive() {
        let inner = VNode::text("s");
        let node = VNode::element("div", None, vec![inner.clone()]);
        node.mark_static();
        assert!(node.is_static());
        assert!(inner.is_static());
    }
}
