#![forbid(unsafe_code)]

//! Mounting, updating, activation and teardown.
//!
//! ```text
//! create ─▶ beforeCreate ─▶ created ─▶ beforeMount ─▶ (render watcher) ─▶ mounted
//!                                                          │
//!                                    data change ─▶ beforeUpdate ─▶ patch ─▶ updated
//!                                                          │
//!                             destroy ─▶ beforeDestroy ─▶ teardown ─▶ destroyed
//! ```
//!
//! # Invariants
//!
//! 1. Hooks run with dependency collection suspended.
//! 2. A child's `mounted` runs before its parent's: children are marked
//!    mounted from the insert queue of the patch that realized them, the
//!    root after its first render.
//! 3. `updated` runs child-first, after the whole flush (scheduler).
//! 4. Destroying twice is a no-op.
//!
//! # Failure Modes
//!
//! - **Hook fails**: reported as `"<hook> hook"`; later handlers of the
//!   same hook still run.
//! - **Render fails**: reported as `"render"`; the previous tree stays.

use std::cell::{Cell, RefCell};

use fvue_core::{BoxError, config, handle_error};
use fvue_reactive::{TargetGuard, Value, Watcher, toggle_observing};
use fvue_vdom::{NodeId, On, OldNode, Patcher, VNode, WeakVNode};

use crate::error::Result;
use crate::instance::{Instance, LifecycleFlags};
use crate::options::Hook;
use crate::{events, props, render};

thread_local! {
    static ACTIVE_INSTANCE: RefCell<Option<Instance>> = const { RefCell::new(None) };
    static UPDATING_CHILD: Cell<bool> = const { Cell::new(false) };
}

/// Makes an instance the one whose patch is in progress, restoring the
/// previous one on drop. Component nodes created during that patch take it
/// as their parent.
struct ActiveInstanceGuard {
    previous: Option<Instance>,
}

impl ActiveInstanceGuard {
    fn push(vm: &Instance) -> Self {
        let previous = ACTIVE_INSTANCE.with(|a| a.replace(Some(vm.clone())));
        Self { previous }
    }
}

impl Drop for ActiveInstanceGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_INSTANCE.with(|a| *a.borrow_mut() = previous);
    }
}

pub(crate) fn active_instance() -> Option<Instance> {
    ACTIVE_INSTANCE.with(|a| a.borrow().clone())
}

/// True while a parent pushes new props into a child.
pub(crate) fn is_updating_child_component() -> bool {
    UPDATING_CHILD.with(Cell::get)
}

struct UpdatingChildGuard(bool);

impl UpdatingChildGuard {
    fn enter() -> Self {
        Self(UPDATING_CHILD.with(|u| u.replace(true)))
    }
}

impl Drop for UpdatingChildGuard {
    fn drop(&mut self) {
        UPDATING_CHILD.with(|u| u.set(self.0));
    }
}

// ─── Hooks ──────────────────────────────────────────────────────────────

pub(crate) fn call_hook(vm: &Instance, hook: Hook) {
    let _target = TargetGuard::push(None);
    let handlers = vm.options().hook_handlers(hook).to_vec();
    for handler in handlers {
        if let Err(err) = handler(vm) {
            handle_error(err, Some(vm.scope()), &format!("{hook} hook"));
        }
    }
    if vm.0.has_hook_event.get() {
        vm.emit(&format!("hook:{hook}"), &[]);
    }
}

// ─── Mount & update ─────────────────────────────────────────────────────

pub(crate) fn mount_component(vm: &Instance, el: Option<NodeId>, hydrating: bool) -> Result<()> {
    vm.0.el.set(el);
    render::ensure_render(vm);
    call_hook(vm, Hook::BeforeMount);

    let weak = vm.downgrade();
    let before = vm.downgrade();
    let hydrate_first = Cell::new(hydrating);
    let watcher = Watcher::builder(move || -> std::result::Result<Value, BoxError> {
        let Some(vm) = weak.upgrade() else {
            return Ok(Value::Undefined);
        };
        let vnode = render::render_vnode(&vm);
        update(&vm, vnode, hydrate_first.replace(false))?;
        Ok(Value::Undefined)
    })
    .render()
    .expression(format!("render {}", vm.display_name()))
    .before(move || {
        if let Some(vm) = before.upgrade() {
            if vm.is_mounted() && !vm.is_destroyed() {
                call_hook(&vm, Hook::BeforeUpdate);
            }
        }
    })
    .owner(vm.owner())
    .build()?;
    tracing::trace!(watcher = watcher.id(), component = %vm.display_name(), "render watcher installed");

    if vm.parent_vnode().is_none() {
        vm.set_flag(LifecycleFlags::MOUNTED, true);
        call_hook(vm, Hook::Mounted);
    }
    Ok(())
}

/// Patch `vnode` in as the instance's new tree.
pub(crate) fn update(vm: &Instance, vnode: VNode, hydrating: bool) -> Result<()> {
    let patcher = vm.patcher()?;
    let prev = vm.0.vnode.replace(Some(vnode.clone()));
    let _active = ActiveInstanceGuard::push(vm);
    let _span = config::performance()
        .then(|| tracing::debug_span!("fvue.patch", component = %vm.display_name()).entered());

    let el = match &prev {
        None => patcher.patch(vm.el().map(OldNode::Host), Some(&vnode), hydrating, false)?,
        Some(prev) => patcher.patch(Some(OldNode::VNode(prev)), Some(&vnode), false, false)?,
    };
    vm.0.el.set(el);

    // A component rendering another component as its root shares that
    // root's host node.
    if let (Some(placeholder), Some(parent)) = (vm.parent_vnode(), vm.parent()) {
        if parent.vnode().is_some_and(|root| root.ptr_eq(&placeholder)) {
            parent.0.el.set(el);
        }
    }
    Ok(())
}

// ─── Teardown ───────────────────────────────────────────────────────────

pub(crate) fn destroy(vm: &Instance) {
    if vm.is_being_destroyed() {
        return;
    }
    call_hook(vm, Hook::BeforeDestroy);
    vm.set_flag(LifecycleFlags::BEING_DESTROYED, true);

    if let Some(parent) = vm.parent() {
        if !parent.is_being_destroyed() && !vm.options().abstract_ {
            parent.0.children.borrow_mut().retain(|c| !c.ptr_eq(vm));
        }
    }

    let render_watcher = vm.0.render_watcher.borrow_mut().take();
    if let Some(watcher) = render_watcher {
        watcher.teardown();
    }
    let watchers = std::mem::take(&mut *vm.0.watchers.borrow_mut());
    for watcher in watchers {
        watcher.teardown();
    }
    if let Some(observer) = vm.data().observer() {
        observer.release_root();
    }
    vm.set_flag(LifecycleFlags::DESTROYED, true);

    if let Some(prev) = vm.vnode() {
        if let Ok(patcher) = vm.patcher() {
            if let Err(err) = patcher.patch(Some(OldNode::VNode(&prev)), None, false, false) {
                handle_error(Box::new(err), Some(vm.scope()), "destroy");
            }
        }
    }
    call_hook(vm, Hook::Destroyed);
    vm.off(None, None);

    if let Some(root) = vm.vnode() {
        root.set_parent(None);
    }
    *vm.0.parent_vnode.borrow_mut() = WeakVNode::default();
    tracing::debug!(uid = vm.uid(), component = %vm.display_name(), "instance destroyed");
}

// ─── Child updates ──────────────────────────────────────────────────────

/// Push a parent re-render's props, listeners and slot content into an
/// existing child.
pub(crate) fn update_child_component(
    vm: &Instance,
    props_data: &fvue_reactive::Obj,
    listeners: &On,
    parent_vnode: &VNode,
    render_children: Vec<VNode>,
) {
    let _updating = UpdatingChildGuard::enter();

    let has_children = !render_children.is_empty()
        || !vm.0.render_children.borrow().is_empty()
        || parent_vnode.data().is_some_and(|d| !d.scoped_slots.is_empty())
        || !vm.0.scoped_slots.borrow().is_empty();

    *vm.0.parent_vnode.borrow_mut() = parent_vnode.downgrade();
    if let Some(root) = vm.vnode() {
        root.set_parent(Some(parent_vnode));
    }
    *vm.0.render_children.borrow_mut() = render_children.clone();

    if !vm.options().props.is_empty() {
        let previous = fvue_reactive::should_observe();
        toggle_observing(false);
        for (key, prop) in &vm.options().props {
            let value = props::validate_prop(key, prop, props_data, vm);
            vm.0.props.set(key, value);
        }
        toggle_observing(previous);
        *vm.0.props_data.borrow_mut() = props_data.clone();
    }

    events::update_component_listeners(vm, listeners);

    if has_children {
        *vm.0.slots.borrow_mut() = render::resolve_slots(&render_children);
        vm.force_update();
    }
}

// ─── keep-alive activation ──────────────────────────────────────────────

fn is_in_inactive_tree(vm: &Instance) -> bool {
    let mut cur = vm.parent();
    while let Some(parent) = cur {
        if parent.is_inactive() {
            return true;
        }
        cur = parent.parent();
    }
    false
}

pub(crate) fn activate_child_component(vm: &Instance, direct: bool) {
    if direct {
        vm.set_flag(LifecycleFlags::DIRECT_INACTIVE, false);
        if is_in_inactive_tree(vm) {
            return;
        }
    } else if vm.has_flag(LifecycleFlags::DIRECT_INACTIVE) {
        return;
    }
    if vm.0.inactive.get() != Some(false) {
        vm.0.inactive.set(Some(false));
        for child in vm.children() {
            activate_child_component(&child, false);
        }
        call_hook(vm, Hook::Activated);
    }
}

pub(crate) fn deactivate_child_component(vm: &Instance, direct: bool) {
    if direct {
        vm.set_flag(LifecycleFlags::DIRECT_INACTIVE, true);
        if is_in_inactive_tree(vm) {
            return;
        }
    }
    if vm.0.inactive.get() != Some(true) {
        vm.0.inactive.set(Some(true));
        for child in vm.children() {
            deactivate_child_component(&child, false);
        }
        call_hook(vm, Hook::Deactivated);
    }
}

// ─── Public surface ─────────────────────────────────────────────────────

impl Instance {
    /// Render into `patcher`'s host, replacing `el` when given.
    pub fn mount(&self, patcher: &Patcher, el: Option<NodeId>) -> Result<()> {
        *self.0.patcher.borrow_mut() = Some(patcher.clone());
        mount_component(self, el, false)
    }

    /// Adopt the existing host subtree at `el` instead of creating one.
    pub fn hydrate(&self, patcher: &Patcher, el: NodeId) -> Result<()> {
        *self.0.patcher.borrow_mut() = Some(patcher.clone());
        mount_component(self, Some(el), true)
    }

    /// Queue a re-render.
    pub fn force_update(&self) {
        if let Some(watcher) = self.render_watcher() {
            watcher.update();
        }
    }

    /// Tear the instance down.
    pub fn destroy(&self) {
        destroy(self);
    }
}
