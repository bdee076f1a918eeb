#![forbid(unsafe_code)]

//! Listener reconciliation.
//!
//! Each bound event gets one stable [`Invoker`] for its whole lifetime.
//! When a re-render produces new handler closures for an event that is
//! already bound, only the invoker's handler list is swapped, so the host
//! (or the component event registry) never sees a remove/add pair.
//!
//! Event names may carry modifier prefixes, in this order:
//! `&` passive, `~` once, `!` capture.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fvue_core::{BoxError, debug};
use fvue_reactive::Value;
use indexmap::IndexMap;

use crate::vnode::{Listener, On};

/// An event name with its modifier prefixes decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub name: String,
    pub once: bool,
    pub capture: bool,
    pub passive: bool,
}

#[must_use]
pub fn normalize_event(raw: &str) -> NormalizedEvent {
    let (passive, rest) = match raw.strip_prefix('&') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (once, rest) = match rest.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let (capture, rest) = match rest.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    NormalizedEvent {
        name: rest.to_string(),
        once,
        capture,
        passive,
    }
}

/// Stable callable wrapping a replaceable handler list.
#[derive(Clone)]
pub struct Invoker(Rc<RefCell<Vec<Listener>>>);

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("handlers", &self.0.borrow().len())
            .finish()
    }
}

impl PartialEq for Invoker {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Invoker {
    #[must_use]
    pub fn new(handlers: Vec<Listener>) -> Self {
        Self(Rc::new(RefCell::new(handlers)))
    }

    pub fn set_handlers(&self, handlers: Vec<Listener>) {
        *self.0.borrow_mut() = handlers;
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.0.borrow().len()
    }

    /// Call every current handler in order. Stops at the first failure.
    pub fn invoke(&self, args: &[Value]) -> Result<(), BoxError> {
        let handlers = self.0.borrow().clone();
        for handler in handlers {
            handler(args)?;
        }
        Ok(())
    }

    /// The invoker as a plain listener.
    #[must_use]
    pub fn as_listener(&self) -> Listener {
        let this = self.clone();
        Rc::new(move |args: &[Value]| this.invoke(args))
    }
}

/// Bound invokers keyed by raw (prefixed) event name.
pub type Invokers = IndexMap<String, Invoker>;

/// Bring `bound` in line with `on`.
///
/// New events get a fresh invoker passed to `add`; events present in both
/// keep their invoker with the handler list replaced; events no longer
/// present are passed to `remove` and dropped. An event with an empty
/// handler list is reported as invalid and skipped.
pub fn update_listeners(
    on: &On,
    bound: &mut Invokers,
    mut add: impl FnMut(&NormalizedEvent, &Invoker),
    mut remove: impl FnMut(&NormalizedEvent, &Invoker),
    owner: Option<&dyn fvue_core::ErrorScope>,
) {
    for (raw, handlers) in on {
        if handlers.is_empty() {
            let event = normalize_event(raw);
            debug::warn(
                &format!("Invalid handler for event \"{}\": got undefined", event.name),
                owner,
            );
            continue;
        }
        match bound.get(raw) {
            Some(invoker) => invoker.set_handlers(handlers.clone()),
            None => {
                let invoker = Invoker::new(handlers.clone());
                add(&normalize_event(raw), &invoker);
                bound.insert(raw.clone(), invoker);
            }
        }
    }
    let stale: Vec<String> = bound
        .keys()
        .filter(|raw| !on.get(*raw).is_some_and(|h| !h.is_empty()))
        .cloned()
        .collect();
    for raw in stale {
        if let Some(invoker) = bound.shift_remove(&raw) {
            remove(&normalize_event(&raw), &invoker);
        }
    }
}
