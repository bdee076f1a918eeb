#![forbid(unsafe_code)]

//! Virtual nodes and reconciliation for fvue.
//!
//! - [`VNode`]: an immutable-per-render description of one output position.
//! - [`NodeOps`] and [`Module`]: the boundary to a host backend. `NodeOps`
//!   creates and moves concrete nodes; modules apply per-concern metadata
//!   (attributes, properties, listeners) in a fixed order.
//! - [`Patcher`]: diffs two trees and applies the minimal set of host
//!   operations, delegating component-typed nodes to [`ComponentHooks`].
//! - [`listeners`]: stable invokers and event-name modifiers shared by the
//!   host events module and component listeners.

pub mod component;
pub mod error;
pub mod host;
pub mod listeners;
pub mod patch;
pub mod vnode;

pub use component::{AsyncPlaceholder, ComponentCtor, ComponentHandle, ComponentHooks};
pub use error::{PatchError, Result};
pub use host::{HostNodeKind, Module, NodeId, NodeOps};
pub use listeners::{Invoker, Invokers, NormalizedEvent, normalize_event, update_listeners};
pub use patch::{OldNode, Patcher, same_vnode};
pub use vnode::{
    ComponentVNodeOptions, Key, Listener, On, ScopedSlotFn, VNode, VNodeData, VNodeKind,
    WeakVNode,
};
