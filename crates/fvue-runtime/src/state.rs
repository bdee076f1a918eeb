#![forbid(unsafe_code)]

//! Instance state: props, methods, data, computed values and watchers, and
//! the keyed read/write surface over them.
//!
//! Lookup order for [`Instance::get`] and [`Instance::set`] is props, then
//! data, then computed, then injections. Methods are invoked through
//! [`Instance::call`] and are not readable as values.
//!
//! # Failure Modes
//!
//! - **`data` factory fails or returns a non-object**: reported (or
//!   warned) and the instance starts with empty data.
//! - **Computed getter fails during `get`**: reported with the instance as
//!   scope; the read yields `Undefined`. [`Instance::try_get`] propagates
//!   instead.

use std::rc::Rc;

use fvue_core::{BoxError, debug, handle_error};
use fvue_reactive::{
    Obj, Path, TargetGuard, Value, Watcher, observe, observer, tick,
    toggle_observing,
};

use crate::error::{Result, RuntimeError};
use crate::instance::Instance;
use crate::options::{WatchCallback, WatchHandler, WatchOptions};
use crate::props;
use crate::util::is_reserved_key;

/// Handle returned by [`Instance::watch`]; tears the watcher down.
#[derive(Debug, Clone)]
pub struct Unwatch(Watcher);

impl Unwatch {
    pub fn unwatch(self) {
        self.0.teardown();
    }

    #[must_use]
    pub fn watcher(&self) -> &Watcher {
        &self.0
    }
}

// ─── Initialization ─────────────────────────────────────────────────────

pub(crate) fn init_state(vm: &Instance) -> Result<()> {
    if !vm.options().props.is_empty() {
        props::init_props(vm);
    }
    if !vm.options().methods.is_empty() {
        check_methods(vm);
    }
    init_data(vm);
    if !vm.options().computed.is_empty() {
        init_computed(vm)?;
    }
    if !vm.options().watch.is_empty() {
        init_watch(vm)?;
    }
    Ok(())
}

fn check_methods(vm: &Instance) {
    for key in vm.options().methods.keys() {
        if vm.options().props.contains_key(key) {
            debug::warn(
                &format!("Method \"{key}\" has already been defined as a prop."),
                Some(vm.scope()),
            );
        }
        if is_reserved_key(key) {
            debug::warn(
                &format!(
                    "Method \"{key}\" conflicts with an existing instance method. \
                     Avoid defining component methods that start with _ or $."
                ),
                Some(vm.scope()),
            );
        }
    }
}

fn init_data(vm: &Instance) {
    let data = match vm.options().data.clone() {
        Some(factory) => get_data(vm, &factory),
        None => Obj::new(),
    };
    for key in data.keys() {
        if vm.options().methods.contains_key(&key) {
            debug::warn(
                &format!("Method \"{key}\" has already been defined as a data property."),
                Some(vm.scope()),
            );
        }
        if vm.options().props.contains_key(&key) {
            debug::warn(
                &format!(
                    "The data property \"{key}\" is already declared as a prop. \
                     Use prop default value instead."
                ),
                Some(vm.scope()),
            );
        }
    }
    observe(&Value::Object(data.clone()), true);
    *vm.0.data.borrow_mut() = data;
}

fn get_data(vm: &Instance, factory: &crate::options::DataFn) -> Obj {
    let _target = TargetGuard::push(None);
    match factory(vm) {
        Ok(Value::Object(obj)) => obj,
        Ok(_) => {
            debug::warn(
                "data functions should return an object.",
                Some(vm.scope()),
            );
            Obj::new()
        }
        Err(err) => {
            handle_error(err, Some(vm.scope()), "data()");
            Obj::new()
        }
    }
}

fn init_computed(vm: &Instance) -> Result<()> {
    let defs = vm.options().computed.clone();
    for (key, def) in defs {
        if vm.options().props.contains_key(&key) {
            debug::warn(
                &format!("The computed property \"{key}\" is already defined as a prop."),
                Some(vm.scope()),
            );
            continue;
        }
        if vm.data().contains_key(&key) {
            debug::warn(
                &format!("The computed property \"{key}\" is already defined in data."),
                Some(vm.scope()),
            );
            continue;
        }
        let weak = vm.downgrade();
        let getter = Rc::clone(&def.get);
        let watcher = Watcher::builder(move || match weak.upgrade() {
            Some(vm) => getter(&vm),
            None => Ok(Value::Undefined),
        })
        .expression(key.clone())
        .lazy()
        .owner(vm.owner())
        .build()?;
        vm.0.computed.borrow_mut().insert(key, watcher);
    }
    Ok(())
}

fn init_watch(vm: &Instance) -> Result<()> {
    let watch = vm.options().watch.clone();
    for (expression, defs) in watch {
        for def in defs {
            let callback: WatchCallback = match def.handler {
                WatchHandler::Callback(cb) => cb,
                WatchHandler::Method(name) => {
                    let Some(method) = vm.options().methods.get(&name).cloned() else {
                        debug::warn(
                            &format!(
                                "Watch handler for \"{expression}\" names unknown method \"{name}\"."
                            ),
                            Some(vm.scope()),
                        );
                        continue;
                    };
                    Rc::new(move |vm: &Instance, new: &Value, old: &Value| {
                        method(vm, &[new.clone(), old.clone()]).map(|_| ())
                    })
                }
            };
            vm.watch_with_callback(&expression, callback, def.options)?;
        }
    }
    Ok(())
}

// ─── Keyed access ───────────────────────────────────────────────────────

impl Instance {
    /// Read `key` (props, data, computed, injections), tracked.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => {
                handle_error(
                    Box::new(err),
                    Some(self.scope()),
                    &format!("getter for \"{key}\""),
                );
                Value::Undefined
            }
        }
    }

    /// Like [`Instance::get`], but a failing computed getter is returned.
    pub fn try_get(&self, key: &str) -> Result<Value> {
        if self.options().props.contains_key(key) {
            return Ok(self.0.props.get(key));
        }
        let data = self.data();
        if !is_reserved_key(key) && data.contains_key(key) {
            return Ok(data.get(key));
        }
        let computed = self.0.computed.borrow().get(key).cloned();
        if let Some(watcher) = computed {
            let value = watcher.evaluate()?;
            watcher.depend();
            return Ok(value);
        }
        if self.0.injections.contains_key(key) {
            return Ok(self.0.injections.get(key));
        }
        debug::warn(
            &format!(
                "Property or method \"{key}\" is not defined on the instance but referenced \
                 during render. Make sure that this property is reactive by initializing it \
                 in the data option."
            ),
            Some(self.scope()),
        );
        Ok(Value::Undefined)
    }

    /// Resolve a dot-delimited path (`"user.name"`) from the instance.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Value {
        match Path::parse(path) {
            Some(parsed) => parsed.resolve_with(|first| self.get(first)),
            None => {
                debug::warn(&format!("Invalid property path: \"{path}\"."), Some(self.scope()));
                Value::Undefined
            }
        }
    }

    /// Assign `key`. Props warn unless the parent is updating them;
    /// computed values go through their setter.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if self.options().props.contains_key(key) {
            self.0.props.set(key, value);
            return;
        }
        let data = self.data();
        if data.contains_key(key) {
            data.set(key, value);
            return;
        }
        if let Some(def) = self.options().computed.get(key).cloned() {
            match def.set {
                Some(setter) => {
                    if let Err(err) = setter(self, value) {
                        handle_error(
                            err,
                            Some(self.scope()),
                            &format!("setter for computed \"{key}\""),
                        );
                    }
                }
                None => debug::warn(
                    &format!("Computed property \"{key}\" was assigned to but it has no setter."),
                    Some(self.scope()),
                ),
            }
            return;
        }
        if self.0.injections.contains_key(key) {
            self.0.injections.set(key, value);
            return;
        }
        debug::warn(
            &format!(
                "Property \"{key}\" is not declared on the instance. Declare it in the data \
                 option or add it to a nested object with set_reactive."
            ),
            Some(self.scope()),
        );
    }

    /// Invoke the method `name`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let Some(method) = self.options().methods.get(name).cloned() else {
            return Err(RuntimeError::UnknownMethod {
                name: name.to_string(),
                component: self.display_name(),
            });
        };
        method(self, args).map_err(|cause| RuntimeError::Method {
            name: name.to_string(),
            cause,
        })
    }

    /// Add `key` to `target` reactively.
    pub fn set_reactive(&self, target: &Value, key: &str, value: impl Into<Value>) -> Result<Value> {
        Ok(observer::set(target, key, value.into())?)
    }

    /// Remove `key` from `target`, notifying watchers.
    pub fn delete_reactive(&self, target: &Value, key: &str) -> Result<()> {
        Ok(observer::del(target, key)?)
    }

    /// Schedule `cb` after the next flush.
    pub fn next_tick(&self, cb: impl FnOnce(&Instance) -> std::result::Result<(), BoxError> + 'static) {
        let weak = self.downgrade();
        let scope: Rc<dyn fvue_core::ErrorScope> = self.0.clone();
        tick::next_tick_in(Some(scope), move || match weak.upgrade() {
            Some(vm) => cb(&vm),
            None => Ok(()),
        });
    }
}

// ─── Watchers ───────────────────────────────────────────────────────────

impl Instance {
    /// Watch a dot-delimited `expression`.
    pub fn watch(
        &self,
        expression: &str,
        callback: impl Fn(&Instance, &Value, &Value) -> std::result::Result<(), BoxError> + 'static,
        options: WatchOptions,
    ) -> Result<Unwatch> {
        self.watch_with_callback(expression, Rc::new(callback), options)
    }

    /// Watch the value computed by `getter`.
    pub fn watch_fn(
        &self,
        getter: impl Fn(&Instance) -> std::result::Result<Value, BoxError> + 'static,
        callback: impl Fn(&Instance, &Value, &Value) -> std::result::Result<(), BoxError> + 'static,
        options: WatchOptions,
    ) -> Result<Unwatch> {
        let weak = self.downgrade();
        let getter = move || match weak.upgrade() {
            Some(vm) => getter(&vm),
            None => Ok(Value::Undefined),
        };
        self.create_user_watcher("<function>".to_string(), getter, Rc::new(callback), options)
    }

    pub(crate) fn watch_with_callback(
        &self,
        expression: &str,
        callback: WatchCallback,
        options: WatchOptions,
    ) -> Result<Unwatch> {
        let path = Path::parse(expression);
        if path.is_none() {
            debug::warn(
                &format!(
                    "Failed watching path: \"{expression}\" Watcher only accepts simple \
                     dot-delimited paths. For full control, use a function instead."
                ),
                Some(self.scope()),
            );
        }
        let weak = self.downgrade();
        let getter = move || -> std::result::Result<Value, BoxError> {
            let (Some(path), Some(vm)) = (&path, weak.upgrade()) else {
                return Ok(Value::Undefined);
            };
            Ok(path.resolve_with(|first| vm.get(first)))
        };
        self.create_user_watcher(expression.to_string(), getter, callback, options)
    }

    fn create_user_watcher(
        &self,
        expression: String,
        getter: impl Fn() -> std::result::Result<Value, BoxError> + 'static,
        callback: WatchCallback,
        options: WatchOptions,
    ) -> Result<Unwatch> {
        let weak = self.downgrade();
        let cb = Rc::clone(&callback);
        let mut builder = Watcher::builder(getter)
            .expression(expression.clone())
            .user()
            .owner(self.owner())
            .callback(move |new, old| match weak.upgrade() {
                Some(vm) => cb(&vm, new, old),
                None => Ok(()),
            });
        if options.deep {
            builder = builder.deep();
        }
        if options.sync {
            builder = builder.sync();
        }
        let watcher = builder.build()?;
        if options.immediate {
            let value = watcher.value();
            if let Err(err) = callback(self, &value, &Value::Undefined) {
                handle_error(
                    err,
                    Some(self.scope()),
                    &format!("callback for immediate watcher \"{expression}\""),
                );
            }
        }
        Ok(Unwatch(watcher))
    }
}

/// Run `f` with observer creation disabled, restoring the previous mode.
pub(crate) fn without_observing<R>(f: impl FnOnce() -> R) -> R {
    let previous = fvue_reactive::should_observe();
    toggle_observing(false);
    let out = f();
    toggle_observing(previous);
    out
}
