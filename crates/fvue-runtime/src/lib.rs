#![forbid(unsafe_code)]

//! Components for fvue: definitions, instances and their lifecycle.
//!
//! - [`ComponentOptions`] describe a component; [`merge`] folds mixins,
//!   `extends` and global mixins together.
//! - [`ComponentDef`] is a registered, extendable definition;
//!   [`global`] holds the base definition, global registrations, plugins
//!   and the template compiler.
//! - [`Instance`] is a live component. Its render watcher re-renders
//!   through a [`fvue_vdom::Patcher`] whenever reactive state it read
//!   changes; child components are created and updated by the patcher via
//!   component node hooks.
//! - [`AsyncComponent`] and the built-in `keep-alive` cover lazily loaded
//!   and cached components.
//!
//! # Architecture
//!
//! ```text
//!  global ──extend──▶ ComponentDef ──instantiate──▶ Instance
//!                                                     │ render watcher
//!                                    RenderContext ◀──┤
//!                                          │ VNode    │
//!                                          ▼          │
//!                         Patcher ──hooks──▶ component_vnode ──▶ child Instance
//! ```
//!
//! Everything runs on one thread. Work triggered by state changes is
//! batched by [`fvue_reactive::scheduler`] and runs when the tick queues
//! are drained.

pub mod async_component;
pub mod compiler;
mod component_vnode;
pub mod definition;
pub mod error;
mod events;
pub mod global;
mod inject;
pub mod instance;
mod keep_alive;
mod lifecycle;
pub mod merge;
pub mod options;
mod props;
pub mod render;
pub mod state;
pub mod util;

pub use async_component::{AsyncComponent, AsyncComponentBuilder, AsyncResolver};
pub use compiler::{CompiledTemplate, CompilerOptions, TemplateCompiler};
pub use definition::ComponentDef;
pub use error::{Result, RuntimeError};
pub use global::Plugin;
pub use instance::{Instance, LifecycleFlags, WeakInstance};
pub use options::{
    Component, ComponentOptions, ComputedDef, DefaultValue, Hook, InjectDef, PropOptions, PropType,
    WatchDef, WatchHandler, WatchOptions,
};
pub use render::RenderContext;
pub use state::Unwatch;
