#![forbid(unsafe_code)]

//! Process-wide (per UI thread) registry: the base definition every
//! component extends, global mixins, globally registered components,
//! installed plugins and the template compiler.

use std::cell::RefCell;
use std::rc::Rc;

use fvue_core::BoxError;
use indexmap::IndexSet;

use crate::compiler::TemplateCompiler;
use crate::definition::ComponentDef;
use crate::error::{Result, RuntimeError};
use crate::instance::Instance;
use crate::keep_alive;
use crate::merge::merge_options;
use crate::options::{Component, ComponentOptions};
use crate::util::validate_component_name;

/// Something installable with [`use_plugin`].
pub trait Plugin {
    /// Installation is keyed by this name.
    fn name(&self) -> &str;

    fn install(&self) -> std::result::Result<(), BoxError>;
}

struct GlobalState {
    base: ComponentDef,
    plugins: IndexSet<String>,
    compiler: Option<Rc<dyn TemplateCompiler>>,
}

impl GlobalState {
    fn new() -> Self {
        let options = ComponentOptions::new().component("KeepAlive", keep_alive::definition());
        Self {
            base: ComponentDef::root(0, options),
            plugins: IndexSet::new(),
            compiler: None,
        }
    }
}

thread_local! {
    static GLOBAL: RefCell<GlobalState> = RefCell::new(GlobalState::new());
}

/// The definition every component extends (`cid` 0).
#[must_use]
pub fn base() -> ComponentDef {
    GLOBAL.with(|g| g.borrow().base.clone())
}

/// Shorthand for `base().extend(options)`.
#[must_use]
pub fn extend(options: ComponentOptions) -> ComponentDef {
    base().extend(options)
}

/// A root instance (`new Vue(options)`).
pub fn new_instance(options: ComponentOptions) -> Result<Instance> {
    base().instantiate(options)
}

/// Merge `mixin` into the base options. Affects every definition,
/// including ones extended earlier.
pub fn mixin(mixin: ComponentOptions) {
    let base = base();
    let merged = merge_options(&base.options(), &mixin);
    base.replace_options(merged);
    tracing::debug!("global mixin applied");
}

/// Register `component` under `name` for every definition.
pub fn component(name: &str, component: impl Into<Component>) {
    validate_component_name(name);
    let base = base();
    let mut options = (*base.options()).clone();
    options.components.insert(name.to_string(), component.into());
    base.replace_options(options);
}

/// Extend the base with `options` (named `name` unless it names itself)
/// and register the result globally.
pub fn define_component(name: &str, mut options: ComponentOptions) -> ComponentDef {
    if options.name.is_none() {
        options.name = Some(name.to_string());
    }
    let def = extend(options);
    component(name, def.clone());
    def
}

/// A globally registered component.
#[must_use]
pub fn resolve_component(name: &str) -> Option<Component> {
    crate::util::resolve_asset(&base().options().components, name).cloned()
}

/// Install `plugin` unless a plugin with the same name already was.
/// Returns whether it ran.
pub fn use_plugin(plugin: &dyn Plugin) -> Result<bool> {
    let name = plugin.name().to_string();
    let fresh = GLOBAL.with(|g| !g.borrow().plugins.contains(&name));
    if !fresh {
        return Ok(false);
    }
    plugin
        .install()
        .map_err(|cause| RuntimeError::Plugin {
            name: name.clone(),
            cause,
        })?;
    GLOBAL.with(|g| g.borrow_mut().plugins.insert(name));
    Ok(true)
}

pub fn set_compiler(compiler: Rc<dyn TemplateCompiler>) {
    GLOBAL.with(|g| g.borrow_mut().compiler = Some(compiler));
}

#[must_use]
pub fn compiler() -> Option<Rc<dyn TemplateCompiler>> {
    GLOBAL.with(|g| g.borrow().compiler.clone())
}

/// Drop global mixins, registrations, plugins and the compiler.
pub fn reset() {
    GLOBAL.with(|g| *g.borrow_mut() = GlobalState::new());
    crate::compiler::clear_cache();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Hook;
    use std::cell::Cell;

    struct Counting {
        runs: Rc<Cell<u32>>,
    }

    impl Plugin for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn install(&self) -> std::result::Result<(), BoxError> {
            self.runs.set(self.runs.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn plugins_install_once_by_name() {
        reset();
        let runs = Rc::new(Cell::new(0));
        let plugin = Counting { runs: Rc::clone(&runs) };
        assert!(use_plugin(&plugin).expect("install"));
        assert!(!use_plugin(&plugin).expect("second install"));
        assert_eq!(runs.get(), 1);
        reset();
    }

    #[test]
    fn global_mixin_reaches_existing_subclasses() {
        reset();
        let sub = extend(ComponentOptions::new().name("late"));
        assert!(sub.options().hook_handlers(Hook::Created).is_empty());
        mixin(ComponentOptions::new().hook(Hook::Created, |_| Ok(())));
        assert_eq!(sub.options().hook_handlers(Hook::Created).len(), 1);
        reset();
    }

    #[test]
    fn keep_alive_is_built_in() {
        reset();
        assert!(resolve_component("keep-alive").is_some());
        let def = define_component("MyWidget", ComponentOptions::new());
        assert_eq!(def.name().as_deref(), Some("MyWidget"));
        assert!(matches!(resolve_component("my-widget"), Some(Component::Def(d)) if d == def));
        assert!(matches!(resolve_component("myWidget"), Some(Component::Def(d)) if d == def));
        reset();
    }
}
