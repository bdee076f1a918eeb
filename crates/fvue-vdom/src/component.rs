#![forbid(unsafe_code)]

//! Seams between the patcher and the component runtime.
//!
//! The patcher never constructs components itself. A component-typed
//! [`VNode`] carries a [`ComponentHooks`] object whose `init`, `prepatch`,
//! `insert` and `destroy` entry points the patcher calls at the matching
//! points of a patch; the hooks in turn drive instance creation, prop and
//! listener updates, `mounted` signalling and teardown.

use std::any::Any;
use std::rc::Rc;

use fvue_core::BoxError;

use crate::host::NodeId;
use crate::vnode::VNode;

/// A component definition as seen by the patcher.
pub trait ComponentCtor {
    /// Definition id, unique per definition.
    fn cid(&self) -> u64;

    fn name(&self) -> Option<String>;

    fn as_any(&self) -> &dyn Any;
}

/// A live component instance as seen by the patcher.
pub trait ComponentHandle {
    /// Host node of the instance's rendered root.
    fn root_elm(&self) -> Option<NodeId>;

    /// The instance's current rendered tree.
    fn root_vnode(&self) -> Option<VNode>;

    fn is_destroyed(&self) -> bool;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Lifecycle entry points of component-typed nodes.
pub trait ComponentHooks {
    /// Create (or, for a cached keep-alive node, reuse) the instance and
    /// realize its tree. Must leave `vnode.component_instance()` set.
    fn init(&self, vnode: &VNode, hydrating: bool) -> Result<(), BoxError>;

    /// `vnode` replaces `old` on the same instance: hand over the instance
    /// and push new props, listeners and slot content.
    fn prepatch(&self, old: &VNode, vnode: &VNode) -> Result<(), BoxError>;

    /// The node's host subtree is attached to the document.
    fn insert(&self, vnode: &VNode);

    /// The node left the tree.
    fn destroy(&self, vnode: &VNode);
}

/// The factory behind an async component placeholder.
pub trait AsyncPlaceholder {
    fn is_resolved(&self) -> bool;

    fn has_failed(&self) -> bool;
}
