#![forbid(unsafe_code)]

//! Dependency publishers and the active-watcher stack.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in subscription order.
//! 2. [`Dep::notify`] iterates a snapshot, so subscribers may subscribe or
//!    unsubscribe while being notified.
//! 3. The target stack is only pushed and popped through [`TargetGuard`];
//!    a panic inside a getter still restores the previous target.
//!
//! # Failure Modes
//!
//! - **Subscriber dropped**: dead `Weak` entries are skipped during
//!   notification and pruned when the list is next rewritten.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::watcher::{Watcher, WatcherInner};

static NEXT_DEP_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct DepInner {
    id: u64,
    subs: RefCell<Vec<Weak<WatcherInner>>>,
}

/// A publisher tracking which watchers read one observable value.
///
/// Cloning a `Dep` creates a new handle to the same subscriber list.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subs", &self.sub_count())
            .finish()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Dep {}

impl Dep {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: NEXT_DEP_ID.fetch_add(1, Ordering::Relaxed),
            subs: RefCell::new(Vec::new()),
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn sub_count(&self) -> usize {
        self.0
            .subs
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn has_subs(&self) -> bool {
        self.0.subs.borrow().iter().any(|w| w.strong_count() > 0)
    }

    pub(crate) fn add_sub(&self, watcher: &Watcher) {
        self.0.subs.borrow_mut().push(watcher.downgrade());
    }

    pub(crate) fn remove_sub(&self, watcher: &Watcher) {
        let target = watcher.as_ptr();
        self.0
            .subs
            .borrow_mut()
            .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), target));
    }

    /// Register the active watcher, if any, as a subscriber.
    pub fn depend(&self) {
        if let Some(target) = current_target() {
            tracing::trace!(dep = self.0.id, watcher = target.id(), "depend");
            target.add_dep(self);
        }
    }

    /// Call `update()` on every subscriber.
    pub fn notify(&self) {
        let subs: Vec<Watcher> = self
            .0
            .subs
            .borrow()
            .iter()
            .filter_map(Watcher::upgrade)
            .collect();
        for sub in subs {
            sub.update();
        }
    }
}

// ─── Target stack ───────────────────────────────────────────────────────

thread_local! {
    static TARGET_STACK: RefCell<Vec<Option<Watcher>>> = const { RefCell::new(Vec::new()) };
}

/// The watcher currently collecting dependencies.
#[must_use]
pub fn current_target() -> Option<Watcher> {
    TARGET_STACK.with(|stack| stack.borrow().last().cloned().flatten())
}

/// True while some watcher is collecting dependencies.
#[must_use]
pub fn has_target() -> bool {
    TARGET_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
}

/// RAII guard for one level of the target stack.
///
/// Pushing `None` suspends collection, which lifecycle hooks and data
/// factories use so that reads inside them are not attributed to a render.
#[must_use = "the previous target is restored when the guard drops"]
pub struct TargetGuard {
    _private: (),
}

impl TargetGuard {
    pub fn push(target: Option<Watcher>) -> Self {
        TARGET_STACK.with(|stack| stack.borrow_mut().push(target));
        Self { _private: () }
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        TARGET_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn noop_watcher() -> Watcher {
        Watcher::builder(|| Ok(Value::Undefined))
            .lazy()
            .build()
            .unwrap()
    }

    #[test]
    fn depend_without_target_is_noop() {
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.sub_count(), 0);
    }

    #[test]
    fn guard_restores_previous_target() {
        let a = noop_watcher();
        let b = noop_watcher();
        assert!(!has_target());
        {
            let _ga = TargetGuard::push(Some(a.clone()));
            assert_eq!(current_target().map(|w| w.id()), Some(a.id()));
            {
                let _gb = TargetGuard::push(Some(b.clone()));
                assert_eq!(current_target().map(|w| w.id()), Some(b.id()));
                {
                    let _gn = TargetGuard::push(None);
                    assert!(!has_target());
                }
                assert_eq!(current_target().map(|w| w.id()), Some(b.id()));
            }
            assert_eq!(current_target().map(|w| w.id()), Some(a.id()));
        }
        assert!(current_target().is_none());
    }

    #[test]
    fn dropped_subscribers_are_skipped() {
        let dep = Dep::new();
        {
            let w = noop_watcher();
            let _g = TargetGuard::push(Some(w.clone()));
            dep.depend();
            assert_eq!(dep.sub_count(), 1);
        }
        assert_eq!(dep.sub_count(), 0);
        dep.notify();
    }

    #[test]
    fn ids_are_unique() {
        let a = Dep::new();
        let b = Dep::new();
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
