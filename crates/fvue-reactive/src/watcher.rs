#![forbid(unsafe_code)]

//! Watchers: render passes, computed values and user watches.
//!
//! # Design
//!
//! A [`Watcher`] owns a getter and collects, on every evaluation, the set of
//! [`Dep`]s the getter read. Two generations of that set are kept: after
//! each evaluation the watcher unsubscribes from every dependency of the
//! previous pass that the new pass did not touch, so a branch switch in the
//! getter drops the stale subscriptions.
//!
//! Flags select how a notification is handled ([`Watcher::update`]):
//!
//! - `LAZY` (computed): mark dirty while nobody depends on the computed
//!   value; otherwise recompute eagerly and notify the watcher's own
//!   subscribers only if the value changed.
//! - `SYNC`: run immediately.
//! - otherwise: hand over to the [`scheduler`].
//!
//! # Invariants
//!
//! 1. Ids are strictly increasing in construction order; the scheduler
//!    relies on this for parent-before-child ordering.
//! 2. A torn-down watcher never runs its getter or callback again.
//! 3. The callback fires when the value changed by strict equality, when
//!    the value is a container, or when the watcher is deep.
//!
//! # Failure Modes
//!
//! - **User getter/callback fails** (`USER`): reported through
//!   [`handle_error`] with the owner's scope; the getter result falls back
//!   to `Undefined`.
//! - **Internal getter/callback fails**: returned as a [`ReactiveError`].
//!   Inside [`Watcher::update`] there is no caller to return to, so the
//!   error is reported instead.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use bitflags::bitflags;
use fvue_core::{BoxError, ErrorScope, handle_error};

use crate::dep::{self, Dep, TargetGuard};
use crate::error::{ReactiveError, Result};
use crate::scheduler;
use crate::traverse::traverse;
use crate::value::{Value, strict_equals};

static NEXT_WATCHER_ID: AtomicU64 = AtomicU64::new(1);

pub type Getter = Rc<dyn Fn() -> std::result::Result<Value, BoxError>>;
pub type Callback = Rc<dyn Fn(&Value, &Value) -> std::result::Result<(), BoxError>>;
pub type BeforeHook = Rc<dyn Fn()>;

bitflags! {
    /// Behaviour switches fixed at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WatcherFlags: u8 {
        /// Also track everything reachable from the value.
        const DEEP = 1 << 0;
        /// Created by user code: errors are reported, not returned.
        const USER = 1 << 1;
        /// Computed: evaluate on demand and cache.
        const LAZY = 1 << 2;
        /// Run immediately on notification instead of batching.
        const SYNC = 1 << 3;
        /// The render watcher of its owner.
        const RENDER = 1 << 4;
    }
}

/// The component side of a watcher.
pub trait WatcherOwner {
    /// Scope used when reporting user errors.
    fn error_scope(&self) -> Option<Rc<dyn ErrorScope>>;

    /// Called once at construction, before the first evaluation.
    fn register_watcher(&self, watcher: &Watcher);

    /// Called from [`Watcher::teardown`] unless the owner is being destroyed.
    fn forget_watcher(&self, watcher: &Watcher);

    fn is_mounted(&self) -> bool;

    fn is_destroyed(&self) -> bool;

    fn is_being_destroyed(&self) -> bool;

    /// Fire the owner's `updated` hook after a flush re-ran its render
    /// watcher.
    fn updated(&self);
}

/// An instance resumed from a cached, off-tree state whose `activated`
/// signal waits for the end of the current flush.
pub trait DeferredActivation {
    fn flush_activation(&self);
}

#[derive(Default)]
struct DepSets {
    deps: Vec<Dep>,
    dep_ids: AHashSet<u64>,
    new_deps: Vec<Dep>,
    new_dep_ids: AHashSet<u64>,
}

pub(crate) struct WatcherInner {
    id: u64,
    expression: String,
    getter: Getter,
    callback: Option<Callback>,
    flags: WatcherFlags,
    before: Option<BeforeHook>,
    owner: Option<Weak<dyn WatcherOwner>>,
    active: Cell<bool>,
    dirty: Cell<bool>,
    value: RefCell<Value>,
    /// Subscribers of a computed value.
    own_dep: Option<Dep>,
    sets: RefCell<DepSets>,
}

/// Handle to one reactive computation.
///
/// Cloning a `Watcher` creates a new handle to the same computation.
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.0.id)
            .field("expression", &self.0.expression)
            .field("flags", &self.0.flags)
            .field("active", &self.0.active.get())
            .field("dirty", &self.0.dirty.get())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Watcher {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Watcher {}

/// Builder for [`Watcher`].
#[must_use]
pub struct WatcherBuilder {
    getter: Getter,
    expression: String,
    callback: Option<Callback>,
    flags: WatcherFlags,
    before: Option<BeforeHook>,
    owner: Option<Weak<dyn WatcherOwner>>,
}

impl WatcherBuilder {
    /// Human-readable source of the getter, used in diagnostics.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn callback(
        mut self,
        cb: impl Fn(&Value, &Value) -> std::result::Result<(), BoxError> + 'static,
    ) -> Self {
        self.callback = Some(Rc::new(cb));
        self
    }

    pub fn flags(mut self, flags: WatcherFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn deep(self) -> Self {
        self.flags(WatcherFlags::DEEP)
    }

    pub fn user(self) -> Self {
        self.flags(WatcherFlags::USER)
    }

    pub fn lazy(self) -> Self {
        self.flags(WatcherFlags::LAZY)
    }

    pub fn sync(self) -> Self {
        self.flags(WatcherFlags::SYNC)
    }

    pub fn render(self) -> Self {
        self.flags(WatcherFlags::RENDER)
    }

    /// Hook run by the scheduler right before each batched run.
    pub fn before(mut self, hook: impl Fn() + 'static) -> Self {
        self.before = Some(Rc::new(hook));
        self
    }

    pub fn owner(mut self, owner: Weak<dyn WatcherOwner>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Create the watcher. Non-lazy watchers evaluate immediately; an
    /// internal getter failure during that first evaluation is returned.
    pub fn build(self) -> Result<Watcher> {
        let lazy = self.flags.contains(WatcherFlags::LAZY);
        let watcher = Watcher(Rc::new(WatcherInner {
            id: NEXT_WATCHER_ID.fetch_add(1, Ordering::Relaxed),
            expression: self.expression,
            getter: self.getter,
            callback: self.callback,
            flags: self.flags,
            before: self.before,
            owner: self.owner,
            active: Cell::new(true),
            dirty: Cell::new(lazy),
            value: RefCell::new(Value::Undefined),
            own_dep: lazy.then(Dep::new),
            sets: RefCell::new(DepSets::default()),
        }));
        if let Some(owner) = watcher.owner() {
            owner.register_watcher(&watcher);
        }
        if !lazy {
            let value = watcher.get()?;
            *watcher.0.value.borrow_mut() = value;
        }
        Ok(watcher)
    }
}

impl Watcher {
    /// Start building a watcher around `getter`.
    pub fn builder(
        getter: impl Fn() -> std::result::Result<Value, BoxError> + 'static,
    ) -> WatcherBuilder {
        WatcherBuilder {
            getter: Rc::new(getter),
            expression: String::new(),
            callback: None,
            flags: WatcherFlags::empty(),
            before: None,
            owner: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.0.expression
    }

    #[must_use]
    pub fn flags(&self) -> WatcherFlags {
        self.0.flags
    }

    #[must_use]
    pub fn is_render(&self) -> bool {
        self.0.flags.contains(WatcherFlags::RENDER)
    }

    #[must_use]
    pub fn is_user(&self) -> bool {
        self.0.flags.contains(WatcherFlags::USER)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Last computed value, without re-evaluating.
    #[must_use]
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Number of dependencies collected by the last evaluation.
    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.0.sets.borrow().deps.len()
    }

    /// Subscribers of this computed value (lazy watchers only).
    #[must_use]
    pub fn subscriber_dep(&self) -> Option<&Dep> {
        self.0.own_dep.as_ref()
    }

    #[must_use]
    pub fn owner(&self) -> Option<Rc<dyn WatcherOwner>> {
        self.0.owner.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn downgrade(&self) -> Weak<WatcherInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<WatcherInner>) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    pub(crate) fn as_ptr(&self) -> *const WatcherInner {
        Rc::as_ptr(&self.0)
    }

    pub(crate) fn call_before(&self) {
        if let Some(before) = &self.0.before {
            before();
        }
    }

    fn error_scope(&self) -> Option<Rc<dyn ErrorScope>> {
        self.owner().and_then(|o| o.error_scope())
    }

    pub(crate) fn report(&self, err: BoxError, info: &str) {
        let scope = self.error_scope();
        handle_error(err, scope.as_deref(), info);
    }

    /// Evaluate the getter with this watcher as the collection target and
    /// re-collect dependencies.
    pub fn get(&self) -> Result<Value> {
        let guard = TargetGuard::push(Some(self.clone()));
        let outcome = match (self.0.getter)() {
            Ok(value) => Ok(value),
            Err(cause) if self.is_user() => {
                self.report(
                    cause,
                    &format!("getter for watcher \"{}\"", self.0.expression),
                );
                Ok(Value::Undefined)
            }
            Err(cause) => Err(ReactiveError::Getter {
                expression: self.0.expression.clone(),
                cause,
            }),
        };
        if self.0.flags.contains(WatcherFlags::DEEP) {
            if let Ok(value) = &outcome {
                traverse(value);
            }
        }
        drop(guard);
        self.cleanup_deps();
        outcome
    }

    /// Record `dep` for the current pass; subscribe if it is new to this
    /// watcher.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let subscribe = {
            let mut sets = self.0.sets.borrow_mut();
            if !sets.new_dep_ids.insert(dep.id()) {
                return;
            }
            sets.new_deps.push(dep.clone());
            !sets.dep_ids.contains(&dep.id())
        };
        if subscribe {
            dep.add_sub(self);
        }
    }

    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let mut sets = self.0.sets.borrow_mut();
            let stale: Vec<Dep> = sets
                .deps
                .iter()
                .filter(|d| !sets.new_dep_ids.contains(&d.id()))
                .cloned()
                .collect();
            let DepSets {
                deps,
                dep_ids,
                new_deps,
                new_dep_ids,
            } = &mut *sets;
            mem::swap(dep_ids, new_dep_ids);
            new_dep_ids.clear();
            mem::swap(deps, new_deps);
            new_deps.clear();
            stale
        };
        for dep in stale {
            dep.remove_sub(self);
        }
    }

    /// React to a dependency notification.
    pub fn update(&self) {
        if self.0.flags.contains(WatcherFlags::LAZY) {
            let Some(own) = self.0.own_dep.clone() else {
                return;
            };
            if !own.has_subs() {
                self.0.dirty.set(true);
                return;
            }
            let result = self.get_and_invoke(|_, _| {
                own.notify();
                Ok(())
            });
            if let Err(err) = result {
                self.report(Box::new(err), "computed update");
            }
        } else if self.0.flags.contains(WatcherFlags::SYNC) {
            if let Err(err) = self.run() {
                self.report(Box::new(err), "sync watcher");
            }
        } else {
            scheduler::queue_watcher(self.clone());
        }
    }

    /// Re-evaluate and invoke the callback. No-op once torn down.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        match self.0.callback.clone() {
            Some(cb) => self.get_and_invoke(|new, old| cb(new, old)),
            None => self.get_and_invoke(|_, _| Ok(())),
        }
    }

    fn get_and_invoke(
        &self,
        cb: impl FnOnce(&Value, &Value) -> std::result::Result<(), BoxError>,
    ) -> Result<()> {
        let value = self.get()?;
        let changed = {
            let current = self.0.value.borrow();
            !strict_equals(&value, &current)
                || value.is_object()
                || self.0.flags.contains(WatcherFlags::DEEP)
        };
        if !changed {
            return Ok(());
        }
        let old = self.0.value.replace(value.clone());
        self.0.dirty.set(false);
        match cb(&value, &old) {
            Ok(()) => Ok(()),
            Err(cause) if self.is_user() => {
                self.report(
                    cause,
                    &format!("callback for watcher \"{}\"", self.0.expression),
                );
                Ok(())
            }
            Err(cause) => Err(ReactiveError::Callback {
                expression: self.0.expression.clone(),
                cause,
            }),
        }
    }

    /// Computed read: recompute if dirty, return the cached value.
    pub fn evaluate(&self) -> Result<Value> {
        if self.0.dirty.get() {
            let value = self.get()?;
            *self.0.value.borrow_mut() = value;
            self.0.dirty.set(false);
        }
        Ok(self.value())
    }

    /// Let the active watcher subscribe to this computed value.
    pub fn depend(&self) {
        if let Some(own) = &self.0.own_dep {
            if dep::has_target() {
                own.depend();
            }
        }
    }

    /// Unsubscribe from every dependency and deactivate.
    pub fn teardown(&self) {
        if !self.is_active() {
            return;
        }
        if let Some(owner) = self.owner() {
            if !owner.is_being_destroyed() {
                owner.forget_watcher(self);
            }
        }
        let deps = mem::take(&mut self.0.sets.borrow_mut().deps);
        for dep in deps {
            dep.remove_sub(self);
        }
        self.0.active.set(false);
    }
}
