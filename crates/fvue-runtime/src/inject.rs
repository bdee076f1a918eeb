#![forbid(unsafe_code)]

//! Provide / inject.
//!
//! An ancestor's `provide` factory runs once, after its own state is
//! initialized. A descendant resolves each injection by walking from
//! itself through its logical ancestors and taking the first provided
//! object holding the key.
//!
//! Injected values are reactive on the injecting instance but are not
//! deeply observed there; assigning one warns, since the next re-render of
//! the provider does not push the value down again.

use std::rc::Rc;

use fvue_core::{debug, handle_error};
use fvue_reactive::{Obj, TargetGuard, Value, observer::define_reactive};

use crate::instance::Instance;
use crate::lifecycle;
use crate::options::DefaultValue;
use crate::state::without_observing;

pub(crate) fn init_injections(vm: &Instance) {
    if vm.options().inject.is_empty() {
        return;
    }
    let resolved = resolve_inject(vm);
    without_observing(|| {
        for (key, value) in resolved {
            let weak = vm.downgrade();
            let name = key.clone();
            let warn_on_write: Rc<dyn Fn()> = Rc::new(move || {
                let Some(vm) = weak.upgrade() else {
                    return;
                };
                if !lifecycle::is_updating_child_component() {
                    debug::warn(
                        &format!(
                            "Avoid mutating an injected value directly since the changes will be \
                             overwritten whenever the provided component re-renders. injection \
                             being mutated: \"{name}\""
                        ),
                        Some(vm.scope()),
                    );
                }
            });
            define_reactive(&vm.0.injections, &key, value, Some(warn_on_write), false);
        }
    });
}

fn resolve_inject(vm: &Instance) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    let _target = TargetGuard::push(None);
    for (key, def) in &vm.options().inject {
        let mut source = Some(vm.clone());
        let mut found = None;
        while let Some(cur) = source {
            let provided = cur.0.provided.borrow().clone();
            if let Some(provided) = provided {
                if provided.contains_key(&def.from) {
                    found = Some(provided.get_untracked(&def.from));
                    break;
                }
            }
            source = cur.parent();
        }
        let value = match (found, &def.default) {
            (Some(value), _) => value,
            (None, Some(DefaultValue::Value(value))) => value.clone(),
            (None, Some(DefaultValue::Factory(factory))) => factory(vm),
            (None, None) => {
                debug::warn(&format!("Injection \"{key}\" not found"), Some(vm.scope()));
                continue;
            }
        };
        out.push((key.clone(), value));
    }
    out
}

pub(crate) fn init_provide(vm: &Instance) {
    let Some(provide) = vm.options().provide.clone() else {
        return;
    };
    match provide(vm) {
        Ok(provided) => *vm.0.provided.borrow_mut() = Some(provided),
        Err(err) => {
            handle_error(err, Some(vm.scope()), "provide()");
            *vm.0.provided.borrow_mut() = Some(Obj::new());
        }
    }
}

impl Instance {
    /// Values this instance provides to its descendants.
    #[must_use]
    pub fn provided(&self) -> Option<Obj> {
        self.0.provided.borrow().clone()
    }
}
