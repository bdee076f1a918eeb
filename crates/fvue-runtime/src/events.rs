#![forbid(unsafe_code)]

//! Instance events.
//!
//! Each instance owns a registry of named handlers. A parent's listeners
//! on a component tag are bound into the child's registry through stable
//! invokers, so re-renders swap handler lists without re-registering.
//!
//! Events named `hook:<lifecycle>` are emitted after the matching
//! lifecycle hook, but only once such a handler has been registered.

use std::rc::Rc;

use fvue_core::{debug, handle_error};
use fvue_reactive::Value;
use fvue_vdom::{Listener, On, update_listeners};

use crate::instance::{EventEntry, Instance};
use crate::util::hyphenate;

impl Instance {
    /// Register `handler` for `event`.
    pub fn on(&self, event: &str, handler: Listener) {
        self.register(event, EventEntry {
            call: Rc::clone(&handler),
            source: handler,
        });
    }

    /// Register `handler` to run on the next `event` only. [`Instance::off`]
    /// with the same handler removes it before it fires.
    pub fn once(&self, event: &str, handler: Listener) {
        let weak = self.downgrade();
        let name = event.to_string();
        let source = Rc::clone(&handler);
        let call: Listener = Rc::new(move |args: &[Value]| {
            if let Some(vm) = weak.upgrade() {
                vm.off(Some(&name), Some(&source));
            }
            source(args)
        });
        self.register(event, EventEntry { call, source: handler });
    }

    fn register(&self, event: &str, entry: EventEntry) {
        if event.starts_with("hook:") {
            self.0.has_hook_event.set(true);
        }
        self.0
            .events
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(entry);
    }

    /// Remove handlers. No event removes everything; an event without a
    /// handler removes every handler for it; both remove the most recently
    /// registered match.
    pub fn off(&self, event: Option<&str>, handler: Option<&Listener>) {
        let mut events = self.0.events.borrow_mut();
        let Some(event) = event else {
            events.clear();
            return;
        };
        let Some(handler) = handler else {
            events.shift_remove(event);
            return;
        };
        let Some(entries) = events.get_mut(event) else {
            return;
        };
        if let Some(pos) = entries
            .iter()
            .rposition(|e| Rc::ptr_eq(&e.call, handler) || Rc::ptr_eq(&e.source, handler))
        {
            entries.remove(pos);
        }
    }

    /// Run every handler registered for `event` with `args`. Handler
    /// failures are reported and do not stop the remaining handlers.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let lower = event.to_lowercase();
        if lower != event && self.0.events.borrow().contains_key(&lower) {
            debug::tip(
                &format!(
                    "Event \"{lower}\" is emitted in component {} but the handler is registered \
                     for \"{event}\". Note that HTML attributes are case-insensitive and you \
                     cannot use v-on to listen to camelCase events when using in-DOM templates. \
                     You should probably use \"{}\" instead of \"{event}\".",
                    self.display_name(),
                    hyphenate(event)
                ),
                None,
            );
        }
        let handlers: Vec<Listener> = self
            .0
            .events
            .borrow()
            .get(event)
            .map(|entries| entries.iter().map(|e| Rc::clone(&e.call)).collect())
            .unwrap_or_default();
        for handler in handlers {
            if let Err(err) = handler(args) {
                handle_error(err, Some(self.scope()), &format!("event handler for \"{event}\""));
            }
        }
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.0.events.borrow().get(event).map_or(0, Vec::len)
    }
}

/// Bind a parent's component listeners into `vm`'s registry.
pub(crate) fn update_component_listeners(vm: &Instance, listeners: &On) {
    let mut bound = std::mem::take(&mut *vm.0.parent_invokers.borrow_mut());
    update_listeners(
        listeners,
        &mut bound,
        |event, invoker| {
            let listener = invoker.as_listener();
            if event.once {
                vm.once(&event.name, Rc::clone(&listener));
            } else {
                vm.on(&event.name, Rc::clone(&listener));
            }
            vm.0.parent_listeners.borrow_mut().push((invoker.clone(), listener));
        },
        |event, invoker| {
            let removed = {
                let mut registered = vm.0.parent_listeners.borrow_mut();
                registered
                    .iter()
                    .position(|(inv, _)| inv == invoker)
                    .map(|pos| registered.remove(pos).1)
            };
            if let Some(listener) = removed {
                vm.off(Some(&event.name), Some(&listener));
            }
        },
        Some(vm.scope()),
    );
    *vm.0.parent_invokers.borrow_mut() = bound;
}
