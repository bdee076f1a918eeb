#![forbid(unsafe_code)]

//! Component instances.
//!
//! An [`Instance`] is a shared handle to one live component: its resolved
//! options, reactive state, watchers, event registry, slot content and the
//! tree it last rendered. Instances form a tree; a parent owns its
//! children strongly and each child refers back weakly.
//!
//! # Invariants
//!
//! 1. Every closure the runtime hands to the reactive or vdom layers holds
//!    the instance weakly; the only strong owners of an instance are its
//!    logical parent, the placeholder node it was created for, and user
//!    handles.
//! 2. No `RefCell` borrow on an instance is held while user code runs.
//! 3. Abstract instances are never listed among their parent's children.
//!
//! # Failure Modes
//!
//! - **Instance dropped while work is queued**: queued watcher runs and
//!   next-tick callbacks upgrade their weak handle and do nothing.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use fvue_core::{ErrorCapture, ErrorScope, config, error::global_handle_error};
use fvue_reactive::{DeferredActivation, Obj, Watcher, WatcherOwner};
use fvue_vdom::{
    ComponentHandle, Invoker, Invokers, Listener, NodeId, Patcher, ScopedSlotFn, VNode, WeakVNode,
};
use indexmap::IndexMap;

use crate::compiler::CompiledTemplate;
use crate::definition::ComponentDef;
use crate::error::{Result, RuntimeError};
use crate::keep_alive::KeepAliveCache;
use crate::options::{ComponentOptions, Hook};
use crate::{events, inject, lifecycle, render, state};

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

bitflags! {
    /// Lifecycle state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LifecycleFlags: u8 {
        const MOUNTED         = 1 << 0;
        const BEING_DESTROYED = 1 << 1;
        const DESTROYED       = 1 << 2;
        /// Deactivated directly by a keep-alive rather than through an
        /// inactive ancestor.
        const DIRECT_INACTIVE = 1 << 3;
    }
}

/// A registered event handler. `source` is the handler the caller passed
/// in; `call` is what runs (a once-wrapper for [`Instance::once`]).
#[derive(Clone)]
pub(crate) struct EventEntry {
    pub(crate) call: Listener,
    pub(crate) source: Listener,
}

/// Placement of a component instance created from a placeholder node.
pub(crate) struct InternalInit {
    pub(crate) parent: Instance,
    pub(crate) parent_vnode: VNode,
}

pub(crate) struct InstanceInner {
    pub(crate) uid: u64,
    pub(crate) this: Weak<InstanceInner>,
    pub(crate) def: ComponentDef,
    pub(crate) options: Rc<ComponentOptions>,
    /// Tag the component was written as in the parent's render.
    pub(crate) component_tag: Option<String>,

    // ─── Tree ───
    pub(crate) parent: Weak<InstanceInner>,
    pub(crate) children: RefCell<Vec<Instance>>,
    pub(crate) parent_vnode: RefCell<WeakVNode>,
    pub(crate) vnode: RefCell<Option<VNode>>,
    pub(crate) el: Cell<Option<NodeId>>,
    pub(crate) patcher: RefCell<Option<Patcher>>,

    // ─── State ───
    pub(crate) props: Obj,
    pub(crate) props_data: RefCell<Obj>,
    pub(crate) data: RefCell<Obj>,
    pub(crate) computed: RefCell<IndexMap<String, Watcher>>,
    pub(crate) watchers: RefCell<Vec<Watcher>>,
    pub(crate) render_watcher: RefCell<Option<Watcher>>,
    pub(crate) injections: Obj,
    pub(crate) provided: RefCell<Option<Obj>>,

    // ─── Events ───
    pub(crate) events: RefCell<IndexMap<String, Vec<EventEntry>>>,
    pub(crate) has_hook_event: Cell<bool>,
    pub(crate) parent_invokers: RefCell<Invokers>,
    /// Listener registered for each parent invoker, for removal.
    pub(crate) parent_listeners: RefCell<Vec<(Invoker, Listener)>>,

    // ─── Render ───
    pub(crate) render_children: RefCell<Vec<VNode>>,
    pub(crate) slots: RefCell<IndexMap<String, Vec<VNode>>>,
    pub(crate) scoped_slots: RefCell<IndexMap<String, ScopedSlotFn>>,
    pub(crate) static_trees: RefCell<Vec<Option<VNode>>>,
    pub(crate) compiled: RefCell<Option<Rc<CompiledTemplate>>>,

    // ─── Lifecycle ───
    pub(crate) flags: Cell<LifecycleFlags>,
    /// `None` until first activated or deactivated.
    pub(crate) inactive: Cell<Option<bool>>,
    pub(crate) keep_alive: RefCell<KeepAliveCache>,
}

/// Shared handle to a component instance.
#[derive(Clone)]
pub struct Instance(pub(crate) Rc<InstanceInner>);

/// Non-owning handle to an instance.
#[derive(Clone, Default)]
pub struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
    #[must_use]
    pub fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(Instance)
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(vm) => f.debug_tuple("WeakInstance").field(&vm).finish(),
            None => f.write_str("WeakInstance(<dropped>)"),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("uid", &self.0.uid)
            .field("name", &self.display_name())
            .field("flags", &self.0.flags.get())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Instance {}

// ─── Creation ───────────────────────────────────────────────────────────

impl Instance {
    /// Build and initialize an instance: events, slots, `beforeCreate`,
    /// injections, state, provide, `created`.
    pub(crate) fn create(
        def: ComponentDef,
        options: Rc<ComponentOptions>,
        internal: Option<InternalInit>,
    ) -> Result<Instance> {
        let uid = NEXT_UID.fetch_add(1, Ordering::Relaxed);
        let placement = internal.as_ref().and_then(|init| {
            init.parent_vnode
                .component_options()
                .cloned()
                .map(|opts| (init.parent.clone(), init.parent_vnode.clone(), opts))
        });

        let logical_parent = placement.as_ref().map(|(parent, _, _)| {
            if options.abstract_ {
                parent.clone()
            } else {
                parent.first_non_abstract()
            }
        });
        let patcher = placement
            .as_ref()
            .and_then(|(parent, _, _)| parent.0.patcher.borrow().clone());
        let (component_tag, render_children, props_data, listeners, parent_vnode) = match &placement {
            Some((_, vnode, opts)) => (
                opts.tag.clone(),
                opts.children.clone(),
                opts.props_data.clone(),
                Some(opts.listeners.clone()),
                vnode.downgrade(),
            ),
            None => (
                None,
                Vec::new(),
                options.props_data.clone().unwrap_or_default(),
                None,
                WeakVNode::default(),
            ),
        };

        let inner = Rc::new_cyclic(|this: &Weak<InstanceInner>| InstanceInner {
            uid,
            this: this.clone(),
            def,
            options,
            component_tag,
            parent: logical_parent.as_ref().map(|p| Rc::downgrade(&p.0)).unwrap_or_default(),
            children: RefCell::new(Vec::new()),
            parent_vnode: RefCell::new(parent_vnode),
            vnode: RefCell::new(None),
            el: Cell::new(None),
            patcher: RefCell::new(patcher),
            props: Obj::new(),
            props_data: RefCell::new(props_data),
            data: RefCell::new(Obj::new()),
            computed: RefCell::new(IndexMap::new()),
            watchers: RefCell::new(Vec::new()),
            render_watcher: RefCell::new(None),
            injections: Obj::new(),
            provided: RefCell::new(None),
            events: RefCell::new(IndexMap::new()),
            has_hook_event: Cell::new(false),
            parent_invokers: RefCell::new(Invokers::new()),
            parent_listeners: RefCell::new(Vec::new()),
            render_children: RefCell::new(render_children),
            slots: RefCell::new(IndexMap::new()),
            scoped_slots: RefCell::new(IndexMap::new()),
            static_trees: RefCell::new(Vec::new()),
            compiled: RefCell::new(None),
            flags: Cell::new(LifecycleFlags::empty()),
            inactive: Cell::new(None),
            keep_alive: RefCell::new(KeepAliveCache::new()),
        });
        let vm = Instance(inner);

        if let Some(parent) = &logical_parent {
            if !vm.0.options.abstract_ {
                parent.0.children.borrow_mut().push(vm.clone());
            }
        }

        let _span = config::performance()
            .then(|| tracing::debug_span!("fvue.init", component = %vm.display_name()).entered());
        tracing::trace!(uid, component = %vm.display_name(), "instance created");

        if let Some(listeners) = listeners {
            if !listeners.is_empty() {
                events::update_component_listeners(&vm, &listeners);
            }
        }
        let slots = render::resolve_slots(&vm.0.render_children.borrow());
        *vm.0.slots.borrow_mut() = slots;

        lifecycle::call_hook(&vm, Hook::BeforeCreate);
        inject::init_injections(&vm);
        state::init_state(&vm)?;
        inject::init_provide(&vm);
        lifecycle::call_hook(&vm, Hook::Created);
        Ok(vm)
    }

    fn first_non_abstract(&self) -> Instance {
        let mut cur = self.clone();
        while cur.0.options.abstract_ {
            match cur.parent() {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        cur
    }

    /// Recover an instance from the handle stored on a component node.
    pub(crate) fn from_handle(handle: Rc<dyn ComponentHandle>) -> Option<Instance> {
        handle.into_any().downcast::<InstanceInner>().ok().map(Instance)
    }

    pub(crate) fn scope(&self) -> &dyn ErrorScope {
        &*self.0
    }

    pub(crate) fn owner(&self) -> Weak<dyn WatcherOwner> {
        let weak: Weak<dyn WatcherOwner> = self.0.this.clone();
        weak
    }

    pub(crate) fn patcher(&self) -> Result<Patcher> {
        self.0
            .patcher
            .borrow()
            .clone()
            .ok_or_else(|| RuntimeError::NoHost {
                component: self.display_name(),
            })
    }

    pub(crate) fn has_flag(&self, flag: LifecycleFlags) -> bool {
        self.0.flags.get().contains(flag)
    }

    pub(crate) fn set_flag(&self, flag: LifecycleFlags, on: bool) {
        let mut flags = self.0.flags.get();
        flags.set(flag, on);
        self.0.flags.set(flags);
    }
}

// ─── Accessors ──────────────────────────────────────────────────────────

impl Instance {
    #[must_use]
    pub fn uid(&self) -> u64 {
        self.0.uid
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.0))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn definition(&self) -> &ComponentDef {
        &self.0.def
    }

    #[must_use]
    pub fn options(&self) -> &Rc<ComponentOptions> {
        &self.0.options
    }

    /// `<Name>` as used in warnings.
    #[must_use]
    pub fn display_name(&self) -> String {
        fvue_core::debug::format_component_name(Some(self.scope()))
    }

    /// Logical parent (abstract ancestors skipped).
    #[must_use]
    pub fn parent(&self) -> Option<Instance> {
        self.0.parent.upgrade().map(Instance)
    }

    #[must_use]
    pub fn root(&self) -> Instance {
        let mut cur = self.clone();
        while let Some(parent) = cur.parent() {
            cur = parent;
        }
        cur
    }

    #[must_use]
    pub fn children(&self) -> Vec<Instance> {
        self.0.children.borrow().clone()
    }

    /// Host node of the rendered root.
    #[must_use]
    pub fn el(&self) -> Option<NodeId> {
        self.0.el.get()
    }

    /// The tree produced by the last render.
    #[must_use]
    pub fn vnode(&self) -> Option<VNode> {
        self.0.vnode.borrow().clone()
    }

    /// The placeholder node this instance was created for.
    #[must_use]
    pub fn parent_vnode(&self) -> Option<VNode> {
        self.0.parent_vnode.borrow().upgrade()
    }

    /// Resolved props object.
    #[must_use]
    pub fn props(&self) -> Obj {
        self.0.props.clone()
    }

    /// Root data object.
    #[must_use]
    pub fn data(&self) -> Obj {
        self.0.data.borrow().clone()
    }

    /// Named slot content passed by the parent.
    #[must_use]
    pub fn slot_nodes(&self, name: &str) -> Vec<VNode> {
        self.0.slots.borrow().get(name).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn slot_names(&self) -> Vec<String> {
        self.0.slots.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn has_scoped_slot(&self, name: &str) -> bool {
        self.0.scoped_slots.borrow().contains_key(name)
    }

    #[must_use]
    pub fn render_watcher(&self) -> Option<Watcher> {
        self.0.render_watcher.borrow().clone()
    }

    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.0.watchers.borrow().len()
    }

    #[must_use]
    pub fn lifecycle_flags(&self) -> LifecycleFlags {
        self.0.flags.get()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.has_flag(LifecycleFlags::MOUNTED)
    }

    #[must_use]
    pub fn is_being_destroyed(&self) -> bool {
        self.has_flag(LifecycleFlags::BEING_DESTROYED)
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.has_flag(LifecycleFlags::DESTROYED)
    }

    /// True while deactivated by a keep-alive.
    #[must_use]
    pub fn is_inactive(&self) -> bool {
        self.0.inactive.get() == Some(true)
    }
}

// ─── Seams ──────────────────────────────────────────────────────────────

impl ErrorScope for InstanceInner {
    fn scope_name(&self) -> Option<String> {
        self.options.name.clone().or_else(|| self.component_tag.clone())
    }

    fn parent_scope(&self) -> Option<Rc<dyn ErrorScope>> {
        self.parent.upgrade().map(|p| p as Rc<dyn ErrorScope>)
    }

    fn capture_error(
        &self,
        err: &fvue_core::BoxError,
        _origin: &dyn ErrorScope,
        info: &str,
    ) -> ErrorCapture {
        let Some(vm) = self.this.upgrade().map(Instance) else {
            return ErrorCapture::Propagate;
        };
        let hooks = self.options.error_captured.clone();
        for hook in hooks {
            match hook(&vm, err, info) {
                Ok(ErrorCapture::Stop) => return ErrorCapture::Stop,
                Ok(ErrorCapture::Propagate) => {}
                Err(hook_err) => global_handle_error(&hook_err, Some(self), "errorCaptured hook"),
            }
        }
        ErrorCapture::Propagate
    }
}

impl WatcherOwner for InstanceInner {
    fn error_scope(&self) -> Option<Rc<dyn ErrorScope>> {
        self.this.upgrade().map(|rc| rc as Rc<dyn ErrorScope>)
    }

    fn register_watcher(&self, watcher: &Watcher) {
        if watcher.is_render() {
            *self.render_watcher.borrow_mut() = Some(watcher.clone());
        }
        self.watchers.borrow_mut().push(watcher.clone());
    }

    fn forget_watcher(&self, watcher: &Watcher) {
        self.watchers.borrow_mut().retain(|w| w != watcher);
    }

    fn is_mounted(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::MOUNTED)
    }

    fn is_destroyed(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::DESTROYED)
    }

    fn is_being_destroyed(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::BEING_DESTROYED)
    }

    fn updated(&self) {
        if let Some(vm) = self.this.upgrade().map(Instance) {
            lifecycle::call_hook(&vm, Hook::Updated);
        }
    }
}

impl DeferredActivation for InstanceInner {
    fn flush_activation(&self) {
        if let Some(vm) = self.this.upgrade().map(Instance) {
            vm.0.inactive.set(Some(true));
            lifecycle::activate_child_component(&vm, true);
        }
    }
}

impl ComponentHandle for InstanceInner {
    fn root_elm(&self) -> Option<NodeId> {
        self.el.get()
    }

    fn root_vnode(&self) -> Option<VNode> {
        self.vnode.borrow().clone()
    }

    fn is_destroyed(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::DESTROYED)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
