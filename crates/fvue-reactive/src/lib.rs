#![forbid(unsafe_code)]

//! Fine-grained dependency tracking for fvue.
//!
//! - [`Value`], [`Obj`], [`Arr`]: the dynamic data model. Objects and arrays
//!   are shared handles; once observed, every field read inside a running
//!   [`Watcher`] is recorded and every write notifies.
//! - [`Dep`]: the publisher attached to one tracked field or to one
//!   observed container.
//! - [`observer`]: `observe`, `define_reactive`, and the explicit
//!   [`set`]/[`del`] helpers for keys that cannot be intercepted.
//! - [`Watcher`]: render passes, computed values and user watches.
//! - [`scheduler`]: batches watcher runs into one ordered flush per tick.
//! - [`tick`]: the microtask/macrotask queues that drive deferred work.
//!
//! # Architecture
//!
//! Everything lives on one logical thread. Shared state uses `Rc` and
//! `RefCell`; dependencies hold watchers weakly, so dropping the last strong
//! handle to a watcher silently unsubscribes it on the next notification.
//! The "currently collecting" watcher is a thread-local stack manipulated
//! only through [`TargetGuard`].
//!
//! # Invariants
//!
//! 1. A watcher is subscribed to a dependency at most once.
//! 2. Writes that do not change a value (NaN included) never notify.
//! 3. No `RefCell` borrow is held while user code or a notification runs.

pub mod dep;
pub mod error;
pub mod observer;
pub mod path;
pub mod scheduler;
pub mod tick;
pub mod traverse;
pub mod value;
pub mod watcher;

pub use dep::{Dep, TargetGuard};
pub use error::{ReactiveError, Result};
pub use observer::{Observer, del, observe, set, should_observe, toggle_observing};
pub use path::Path;
pub use tick::next_tick;
pub use value::{Arr, Obj, Value};
pub use watcher::{DeferredActivation, Watcher, WatcherBuilder, WatcherFlags, WatcherOwner};
