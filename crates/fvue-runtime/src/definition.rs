#![forbid(unsafe_code)]

//! Component definitions.
//!
//! A [`ComponentDef`] is what a component name resolves to: a unique `cid`
//! and the fully merged options every instance starts from. Definitions
//! form a chain through [`ComponentDef::extend`]; the root of every chain
//! is the global base definition owned by [`crate::global`].
//!
//! # Design
//!
//! A definition stores the options it was extended with, not only the
//! merged result. [`ComponentDef::options`] compares the super
//! definition's current options with the snapshot it merged against and
//! re-merges when they differ, so a global mixin or a globally registered
//! component applied after `extend` still reaches the subclass.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use fvue_vdom::ComponentCtor;

use crate::error::Result;
use crate::instance::Instance;
use crate::merge::merge_options;
use crate::options::ComponentOptions;
use crate::util::validate_component_name;

static NEXT_CID: AtomicU64 = AtomicU64::new(1);

struct DefInner {
    cid: u64,
    super_def: Option<ComponentDef>,
    extend_options: Rc<ComponentOptions>,
    /// Super options the current `options` were merged against.
    super_options: RefCell<Option<Rc<ComponentOptions>>>,
    options: RefCell<Rc<ComponentOptions>>,
}

/// Shared handle to a component definition.
#[derive(Clone)]
pub struct ComponentDef(Rc<DefInner>);

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("cid", &self.0.cid)
            .field("name", &self.options().name)
            .finish()
    }
}

impl PartialEq for ComponentDef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl ComponentDef {
    /// A chain root: options are used as given (after flattening
    /// `extends`/`mixins`).
    pub(crate) fn root(cid: u64, options: ComponentOptions) -> Self {
        let options = Rc::new(merge_options(&ComponentOptions::new(), &options));
        Self(Rc::new(DefInner {
            cid,
            super_def: None,
            extend_options: Rc::clone(&options),
            super_options: RefCell::new(None),
            options: RefCell::new(options),
        }))
    }

    /// A definition with no super: global mixins do not apply to it.
    #[must_use]
    pub fn standalone(options: ComponentOptions) -> Self {
        Self::root(NEXT_CID.fetch_add(1, Ordering::Relaxed), options)
    }

    /// Subclass this definition.
    #[must_use]
    pub fn extend(&self, options: ComponentOptions) -> Self {
        if let Some(name) = &options.name {
            validate_component_name(name);
        }
        let super_options = self.options();
        let merged = merge_options(&super_options, &options);
        let def = Self(Rc::new(DefInner {
            cid: NEXT_CID.fetch_add(1, Ordering::Relaxed),
            super_def: Some(self.clone()),
            extend_options: Rc::new(options),
            super_options: RefCell::new(Some(super_options)),
            options: RefCell::new(Rc::new(merged)),
        }));
        tracing::trace!(cid = def.cid(), super_cid = self.cid(), "component definition extended");
        def
    }

    #[must_use]
    pub fn cid(&self) -> u64 {
        self.0.cid
    }

    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.options().name.clone()
    }

    #[must_use]
    pub fn super_def(&self) -> Option<&ComponentDef> {
        self.0.super_def.as_ref()
    }

    /// Current merged options, re-resolved if the super chain changed.
    #[must_use]
    pub fn options(&self) -> Rc<ComponentOptions> {
        if let Some(super_def) = &self.0.super_def {
            let latest = super_def.options();
            let stale = self
                .0
                .super_options
                .borrow()
                .as_ref()
                .is_none_or(|seen| !Rc::ptr_eq(seen, &latest));
            if stale {
                let merged = merge_options(&latest, &self.0.extend_options);
                *self.0.options.borrow_mut() = Rc::new(merged);
                *self.0.super_options.borrow_mut() = Some(latest);
            }
        }
        Rc::clone(&self.0.options.borrow())
    }

    /// Replace the options of a chain root.
    pub(crate) fn replace_options(&self, options: ComponentOptions) {
        *self.0.options.borrow_mut() = Rc::new(options);
    }

    /// Create a standalone instance from this definition, with `options`
    /// merged on top.
    pub fn instantiate(&self, options: ComponentOptions) -> Result<Instance> {
        let merged = merge_options(&self.options(), &options);
        Instance::create(self.clone(), Rc::new(merged), None)
    }
}

impl ComponentCtor for ComponentDef {
    fn cid(&self) -> u64 {
        self.0.cid
    }

    fn name(&self) -> Option<String> {
        ComponentDef::name(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Hook;

    #[test]
    fn extend_merges_super_options() {
        let base = ComponentDef::standalone(ComponentOptions::new().hook(Hook::Created, |_| Ok(())));
        let sub = base.extend(ComponentOptions::new().name("sub").hook(Hook::Created, |_| Ok(())));
        assert_ne!(base.cid(), sub.cid());
        assert_eq!(sub.name().as_deref(), Some("sub"));
        assert_eq!(sub.options().hook_handlers(Hook::Created).len(), 2);
        assert_eq!(sub.super_def(), Some(&base));
    }

    #[test]
    fn subclass_sees_later_root_changes() {
        let base = ComponentDef::standalone(ComponentOptions::new());
        let sub = base.extend(ComponentOptions::new().name("sub"));
        let first = sub.options();
        assert!(Rc::ptr_eq(&first, &sub.options()), "unchanged super keeps the cache");

        let patched = merge_options(&base.options(), &ComponentOptions::new().hook(Hook::Mounted, |_| Ok(())));
        base.replace_options(patched);
        assert_eq!(sub.options().hook_handlers(Hook::Mounted).len(), 1);
        assert_eq!(sub.name().as_deref(), Some("sub"));
    }
}
