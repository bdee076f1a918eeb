#![forbid(unsafe_code)]

//! The host-backend boundary.

use std::fmt;

use crate::vnode::VNode;

/// Opaque handle to a concrete host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a host node is, as far as hydration needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNodeKind {
    Element(String),
    Text,
    Comment,
}

/// Structural operations on host nodes.
pub trait NodeOps {
    fn create_element(&self, tag: &str, vnode: &VNode) -> NodeId;

    fn create_text_node(&self, text: &str) -> NodeId;

    fn create_comment(&self, text: &str) -> NodeId;

    fn insert_before(&self, parent: NodeId, node: NodeId, reference: NodeId);

    fn remove_child(&self, parent: NodeId, child: NodeId);

    fn append_child(&self, parent: NodeId, child: NodeId);

    fn parent_node(&self, node: NodeId) -> Option<NodeId>;

    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    fn first_child(&self, node: NodeId) -> Option<NodeId>;

    fn kind(&self, node: NodeId) -> Option<HostNodeKind>;

    fn text_content(&self, node: NodeId) -> Option<String>;

    fn set_text_content(&self, node: NodeId, text: &str);

    /// Lower-cased tag name of an element node.
    fn tag_name(&self, node: NodeId) -> Option<String> {
        match self.kind(node)? {
            HostNodeKind::Element(tag) => Some(tag.to_ascii_lowercase()),
            _ => None,
        }
    }
}

/// One per-concern metadata hook table (attributes, properties,
/// listeners, ...). Modules run in registration order.
pub trait Module {
    fn name(&self) -> &'static str;

    /// A new element (or component root) was realized for `vnode`.
    fn create(&self, _vnode: &VNode) {}

    /// `vnode` replaces `old` on the same host node.
    fn update(&self, _old: &VNode, _vnode: &VNode) {}

    /// `vnode`'s host node is about to be detached.
    fn remove(&self, _vnode: &VNode) {}

    /// `vnode` is being torn down.
    fn destroy(&self, _vnode: &VNode) {}
}
