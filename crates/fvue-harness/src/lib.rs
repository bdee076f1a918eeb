#![forbid(unsafe_code)]

//! In-memory host backend.
//!
//! [`MemoryHost`] implements [`NodeOps`](fvue_vdom::NodeOps) over an arena
//! of plain nodes, records every structural operation in an inspectable
//! log, serializes subtrees to HTML and dispatches events to bound
//! listeners. [`modules`] holds the attribute, property and listener
//! modules that apply per-node metadata to it.

pub mod host;
pub mod modules;

pub use host::{HostOp, MemoryHost};
pub use modules::{AttrsModule, DomPropsModule, EventsModule};
