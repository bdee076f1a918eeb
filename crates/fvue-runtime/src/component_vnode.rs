#![forbid(unsafe_code)]

//! Component placeholder nodes.
//!
//! [`create_component`] turns a resolved component and the data written on
//! its tag into a placeholder [`VNode`]. The patcher drives the child
//! instance through [`ComponentVNodeHooks`]:
//!
//! | hook       | effect                                                      |
//! |------------|-------------------------------------------------------------|
//! | `init`     | create and mount the child (or reuse a kept-alive one)      |
//! | `prepatch` | hand the instance to the new node; push props and listeners |
//! | `insert`   | `mounted` on first insertion; activation under keep-alive   |
//! | `destroy`  | destroy, or deactivate under keep-alive                     |

use std::rc::Rc;

use fvue_core::{BoxError, error::boxed};
use fvue_reactive::scheduler;
use fvue_vdom::{ComponentHandle, ComponentHooks, ComponentVNodeOptions, VNode, VNodeData};

use crate::async_component::resolve_async_component;
use crate::definition::ComponentDef;
use crate::instance::{Instance, InternalInit, LifecycleFlags, WeakInstance};
use crate::lifecycle;
use crate::options::{Component, Hook};
use crate::props::extract_props;

pub(crate) struct ComponentVNodeHooks {
    /// Instance whose render produced the node.
    context: WeakInstance,
}

fn definition_of(vnode: &VNode) -> Option<ComponentDef> {
    vnode
        .component_options()
        .and_then(|opts| opts.ctor.as_any().downcast_ref::<ComponentDef>().cloned())
}

fn instance_of(vnode: &VNode) -> Option<Instance> {
    vnode.component_instance().and_then(Instance::from_handle)
}

impl ComponentHooks for ComponentVNodeHooks {
    fn init(&self, vnode: &VNode, hydrating: bool) -> Result<(), BoxError> {
        if let Some(existing) = vnode.component_instance() {
            if !existing.is_destroyed() && vnode.keep_alive() {
                return self.prepatch(vnode, vnode);
            }
        }
        let parent = lifecycle::active_instance()
            .or_else(|| self.context.upgrade())
            .ok_or_else(|| boxed("component node patched outside of any instance"))?;
        let def = definition_of(vnode).ok_or_else(|| boxed("component node carries no definition"))?;
        let options = def.options();
        let child = Instance::create(
            def,
            options,
            Some(InternalInit {
                parent,
                parent_vnode: vnode.clone(),
            }),
        )?;
        let handle: Rc<dyn ComponentHandle> = child.0.clone();
        vnode.set_component_instance(Some(handle));
        let el = if hydrating { vnode.elm() } else { None };
        lifecycle::mount_component(&child, el, hydrating)?;
        Ok(())
    }

    fn prepatch(&self, old: &VNode, vnode: &VNode) -> Result<(), BoxError> {
        let handle = old
            .component_instance()
            .ok_or_else(|| boxed("component node has no instance to carry over"))?;
        vnode.set_component_instance(Some(Rc::clone(&handle)));
        let child = Instance::from_handle(handle).ok_or_else(|| boxed("foreign component instance"))?;
        let opts = vnode
            .component_options()
            .ok_or_else(|| boxed("prepatch on a non-component node"))?;
        lifecycle::update_child_component(
            &child,
            &opts.props_data,
            &opts.listeners,
            vnode,
            opts.children.clone(),
        );
        Ok(())
    }

    fn insert(&self, vnode: &VNode) {
        let Some(child) = instance_of(vnode) else {
            return;
        };
        if !child.is_mounted() {
            child.set_flag(LifecycleFlags::MOUNTED, true);
            lifecycle::call_hook(&child, Hook::Mounted);
        }
        if vnode.keep_alive() {
            let context_mounted = self.context.upgrade().is_some_and(|c| c.is_mounted());
            if context_mounted {
                // Activation waits for the flush so `activated` sees the
                // whole updated tree.
                child.0.inactive.set(Some(false));
                scheduler::queue_activated_component(child.0.clone());
            } else {
                lifecycle::activate_child_component(&child, true);
            }
        }
    }

    fn destroy(&self, vnode: &VNode) {
        let Some(child) = instance_of(vnode) else {
            return;
        };
        if child.is_destroyed() {
            return;
        }
        if vnode.keep_alive() {
            lifecycle::deactivate_child_component(&child, true);
        } else {
            child.destroy();
        }
    }
}

/// Build the placeholder node for `component` rendered by `context`.
pub(crate) fn create_component(
    component: &Component,
    data: Option<VNodeData>,
    context: &Instance,
    children: Vec<VNode>,
    tag: Option<&str>,
) -> VNode {
    let def = match component {
        Component::Def(def) => def.clone(),
        Component::Async(factory) => match resolve_async_component(factory, context) {
            Some(def) => def,
            None => return factory.placeholder(data),
        },
    };
    let options = def.options();
    let mut data = data.unwrap_or_default();

    let props_data = extract_props(&mut data, &options, tag);
    let listeners = std::mem::take(&mut data.on);
    data.on = std::mem::take(&mut data.native_on);

    if options.abstract_ {
        data = VNodeData {
            slot: data.slot.take(),
            ..VNodeData::default()
        };
    }

    tracing::trace!(cid = def.cid(), tag, "component node created");

    VNode::component(
        ComponentVNodeOptions {
            ctor: Rc::new(def),
            props_data,
            listeners,
            tag: tag.map(str::to_string),
            children,
            hooks: Rc::new(ComponentVNodeHooks {
                context: context.downgrade(),
            }),
        },
        data,
    )
}
