#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! The runtime is single-threaded, so configuration lives in a thread-local
//! slot rather than behind a lock. Every thread starts from
//! [`Config::default()`]; tests that install handlers should call
//! [`reset`] when done (or simply rely on per-test threads).
//!
//! # Invariants
//!
//! 1. Handlers are cloned out of the slot before they are invoked, so a
//!    handler may itself read or update the configuration.
//! 2. `max_update_count` is never zero; [`Config::with_max_update_count`]
//!    clamps to 1.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{BoxError, ErrorContext};

/// Default runaway-loop threshold for one scheduler flush.
pub const MAX_UPDATE_COUNT: usize = 100;

/// Global error reporting channel.
pub type ErrorHandler = Rc<dyn Fn(&BoxError, &ErrorContext)>;

/// Global warning channel.
pub type WarnHandler = Rc<dyn Fn(&Warning)>;

/// Platform tag/attribute classification predicate.
pub type TagPredicate = Rc<dyn Fn(&str) -> bool>;

/// A configuration or misuse warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    /// Formatted component name (`<Child>`), when raised inside a component.
    pub component: Option<String>,
    /// Multi-line ancestry trace, empty outside components.
    pub trace: String,
}

/// Runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Suppress all warnings and tips.
    pub silent: bool,
    /// Emit timing spans around render and patch.
    pub performance: bool,
    /// How many times one watcher may run in a single flush.
    pub max_update_count: usize,
    pub error_handler: Option<ErrorHandler>,
    pub warn_handler: Option<WarnHandler>,
    /// Tags that are never treated as unknown components.
    pub ignored_elements: Vec<String>,
    pub is_reserved_tag: TagPredicate,
    pub is_reserved_attr: TagPredicate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            silent: false,
            performance: false,
            max_update_count: MAX_UPDATE_COUNT,
            error_handler: None,
            warn_handler: None,
            ignored_elements: Vec::new(),
            is_reserved_tag: Rc::new(|_| false),
            is_reserved_attr: Rc::new(|_| false),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("silent", &self.silent)
            .field("performance", &self.performance)
            .field("max_update_count", &self.max_update_count)
            .field("error_handler", &self.error_handler.is_some())
            .field("warn_handler", &self.warn_handler.is_some())
            .field("ignored_elements", &self.ignored_elements)
            .finish_non_exhaustive()
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn with_performance(mut self, performance: bool) -> Self {
        self.performance = performance;
        self
    }

    #[must_use]
    pub fn with_max_update_count(mut self, count: usize) -> Self {
        self.max_update_count = count.max(1);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, handler: impl Fn(&BoxError, &ErrorContext) + 'static) -> Self {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn with_warn_handler(mut self, handler: impl Fn(&Warning) + 'static) -> Self {
        self.warn_handler = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn with_ignored_elements<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_elements = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_reserved_tag(mut self, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        self.is_reserved_tag = Rc::new(predicate);
        self
    }

    #[must_use]
    pub fn with_reserved_attr(mut self, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        self.is_reserved_attr = Rc::new(predicate);
        self
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Read the active configuration.
pub fn with<R>(f: impl FnOnce(&Config) -> R) -> R {
    CONFIG.with(|cfg| f(&cfg.borrow()))
}

/// Mutate the active configuration in place.
pub fn update(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|cfg| f(&mut cfg.borrow_mut()));
}

/// Replace the active configuration.
pub fn set(config: Config) {
    CONFIG.with(|cfg| *cfg.borrow_mut() = config);
}

/// Restore defaults.
pub fn reset() {
    set(Config::default());
}

#[must_use]
pub fn error_handler() -> Option<ErrorHandler> {
    with(|cfg| cfg.error_handler.clone())
}

#[must_use]
pub fn warn_handler() -> Option<WarnHandler> {
    with(|cfg| cfg.warn_handler.clone())
}

#[must_use]
pub fn is_silent() -> bool {
    with(|cfg| cfg.silent)
}

#[must_use]
pub fn performance() -> bool {
    with(|cfg| cfg.performance)
}

#[must_use]
pub fn max_update_count() -> usize {
    with(|cfg| cfg.max_update_count)
}

#[must_use]
pub fn is_reserved_tag(tag: &str) -> bool {
    let predicate = with(|cfg| Rc::clone(&cfg.is_reserved_tag));
    predicate(tag)
}

#[must_use]
pub fn is_reserved_attr(attr: &str) -> bool {
    let predicate = with(|cfg| Rc::clone(&cfg.is_reserved_attr));
    predicate(attr)
}

#[must_use]
pub fn is_ignored_element(tag: &str) -> bool {
    with(|cfg| cfg.ignored_elements.iter().any(|t| t == tag))
}
