#![forbid(unsafe_code)]

//! Error taxonomy and the user-error reporting channel.
//!
//! User code (render functions, hooks, watch callbacks, handlers) returns
//! `Result<_, BoxError>`. When such an error reaches a core boundary it is
//! passed to [`handle_error`], which offers it to every ancestor scope's
//! capture hooks and finally to the global handler.
//!
//! # Failure Modes
//!
//! - **Capture hook fails**: the hook's own error is sent straight to the
//!   global channel with info `"errorCaptured hook"`; propagation of the
//!   original error continues.
//! - **Global handler missing**: the error is logged via `tracing::error!`.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::config;
use crate::debug;

/// Error type returned by user-supplied closures.
pub type BoxError = Box<dyn std::error::Error + 'static>;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to install tracing subscriber: {message}")]
    Subscriber { message: String },

    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Build a [`BoxError`] from a plain message.
#[must_use]
pub fn boxed(message: impl Into<String>) -> BoxError {
    Box::new(CoreError::message(message))
}

/// Whether an error should continue travelling up the scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCapture {
    Propagate,
    Stop,
}

/// Context passed to the global error handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Where the error surfaced (`render`, `mounted hook`, ...).
    pub info: String,
    /// Formatted name of the component the error originated in.
    pub component: Option<String>,
}

/// A node in the component ancestry, as seen by the reporting channel.
pub trait ErrorScope {
    /// Declared component name, if any.
    fn scope_name(&self) -> Option<String>;

    /// True for the root of a component tree.
    fn is_root_scope(&self) -> bool {
        self.parent_scope().is_none()
    }

    fn parent_scope(&self) -> Option<Rc<dyn ErrorScope>>;

    /// Offer an error raised in a descendant (`origin`) to this scope.
    fn capture_error(&self, _err: &BoxError, _origin: &dyn ErrorScope, _info: &str) -> ErrorCapture {
        ErrorCapture::Propagate
    }
}

impl fmt::Debug for dyn ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&debug::format_component_name(Some(self)))
    }
}

/// Report a user error raised inside `scope` while doing `info`.
pub fn handle_error(err: BoxError, scope: Option<&dyn ErrorScope>, info: &str) {
    if let Some(origin) = scope {
        let mut cur = origin.parent_scope();
        while let Some(ancestor) = cur {
            if ancestor.capture_error(&err, origin, info) == ErrorCapture::Stop {
                return;
            }
            cur = ancestor.parent_scope();
        }
    }
    global_handle_error(&err, scope, info);
}

/// Send an error straight to the global channel, skipping capture hooks.
pub fn global_handle_error(err: &BoxError, scope: Option<&dyn ErrorScope>, info: &str) {
    let context = ErrorContext {
        info: info.to_string(),
        component: scope.map(|s| debug::format_component_name(Some(s))),
    };
    match config::error_handler() {
        Some(handler) => handler(err, &context),
        None => log_error(err, scope, info),
    }
}

fn log_error(err: &BoxError, scope: Option<&dyn ErrorScope>, info: &str) {
    debug::warn(&format!("Error in {info}: \"{err}\""), scope);
    let component = scope.map(|s| debug::format_component_name(Some(s)));
    tracing::error!(
        info,
        component = component.as_deref(),
        error = %err,
        "unhandled error"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct Scope {
        name: &'static str,
        parent: Option<Rc<Scope>>,
        stop: bool,
        seen: Cell<usize>,
    }

    impl ErrorScope for Scope {
        fn scope_name(&self) -> Option<String> {
            Some(self.name.to_string())
        }

        fn parent_scope(&self) -> Option<Rc<dyn ErrorScope>> {
            self.parent.clone().map(|p| p as Rc<dyn ErrorScope>)
        }

        fn capture_error(&self, _err: &BoxError, _origin: &dyn ErrorScope, _info: &str) -> ErrorCapture {
            self.seen.set(self.seen.get() + 1);
            if self.stop {
                ErrorCapture::Stop
            } else {
                ErrorCapture::Propagate
            }
        }
    }

    fn scope(name: &'static str, parent: Option<Rc<Scope>>, stop: bool) -> Rc<Scope> {
        Rc::new(Scope {
            name,
            parent,
            stop,
            seen: Cell::new(0),
        })
    }

    #[test]
    fn walks_ancestors_then_global() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        config::set(config::Config::new().with_error_handler(move |err, ctx| {
            sink.borrow_mut().push((err.to_string(), ctx.clone()));
        }));

        let root = scope("Root", None, false);
        let mid = scope("Mid", Some(Rc::clone(&root)), false);
        let leaf = scope("Leaf", Some(Rc::clone(&mid)), false);
        handle_error(boxed("boom"), Some(&*leaf), "render");

        assert_eq!(leaf.seen.get(), 0, "origin does not capture its own error");
        assert_eq!(mid.seen.get(), 1);
        assert_eq!(root.seen.get(), 1);
        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "boom");
        assert_eq!(reports[0].1.info, "render");
        assert_eq!(reports[0].1.component.as_deref(), Some("<Leaf>"));
        config::reset();
    }

    #[test]
    fn capture_stop_swallows() {
        let hits = Rc::new(Cell::new(0));
        let sink = Rc::clone(&hits);
        config::set(config::Config::new().with_error_handler(move |_, _| sink.set(sink.get() + 1)));

        let root = scope("Root", None, false);
        let mid = scope("Mid", Some(Rc::clone(&root)), true);
        let leaf = scope("Leaf", Some(Rc::clone(&mid)), false);
        handle_error(boxed("boom"), Some(&*leaf), "render");

        assert_eq!(mid.seen.get(), 1);
        assert_eq!(root.seen.get(), 0);
        assert_eq!(hits.get(), 0);
        config::reset();
    }

    #[test]
    #[tracing_test::traced_test]
    fn unhandled_errors_are_logged() {
        config::reset();
        handle_error(boxed("kaput"), None, "nextTick");
        assert!(logs_contain("Error in nextTick"));
        assert!(logs_contain("kaput"));
    }
}
