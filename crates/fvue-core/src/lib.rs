#![forbid(unsafe_code)]

//! Core plumbing shared by every fvue crate.
//!
//! - [`config`]: thread-local runtime configuration (reporting handlers,
//!   silence, performance spans, platform predicates).
//! - [`error`]: the boxed user-error type, the [`ErrorScope`] seam used to
//!   walk component ancestry, and [`handle_error`].
//! - [`debug`]: warnings and tips, component-name formatting and traces.
//! - `logging` (feature `subscriber`): subscriber installation.

pub mod config;
pub mod debug;
pub mod error;
#[cfg(feature = "subscriber")]
pub mod logging;

pub use config::Config;
pub use debug::{tip, warn};
pub use error::{BoxError, CoreError, ErrorCapture, ErrorContext, ErrorScope, handle_error};
