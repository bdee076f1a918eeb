#![forbid(unsafe_code)]

//! Batched, ordered watcher execution.
//!
//! Watchers notified during one synchronous turn are collected into a
//! single queue and run together on the next tick.
//!
//! # Flush protocol
//!
//! 1. Sort the queue by watcher id (construction order). Parents are built
//!    before children and user watches before their owner's render
//!    watcher, so this order is parent-first and watch-before-render.
//! 2. Walk the queue by index; entries added mid-flush are inserted at
//!    their sorted position but never before the cursor, so they still run
//!    in this flush.
//! 3. A watcher re-queued more than `max_update_count` times in one flush
//!    is reported as a probable infinite loop and skipped for the rest of
//!    the flush.
//! 4. Reset all bookkeeping, then fire deferred `activated` signals, then
//!    `updated` hooks of re-rendered, mounted owners in reverse order
//!    (children before parents).
//!
//! # Invariants
//!
//! 1. A watcher is queued at most once at any time.
//! 2. At most one flush is scheduled at any time.
//! 3. State is reset before post-flush hooks, so watchers queued from those
//!    hooks start a fresh flush.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use fvue_core::{config, debug};
use web_time::Instant;

use crate::tick;
use crate::watcher::{DeferredActivation, Watcher};

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Watcher>,
    has: AHashSet<u64>,
    circular: AHashMap<u64, usize>,
    halted: AHashSet<u64>,
    activated: Vec<Rc<dyn DeferredActivation>>,
    waiting: bool,
    flushing: bool,
    index: usize,
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Queue `watcher` for the next flush. Duplicate entries are ignored.
pub fn queue_watcher(watcher: Watcher) {
    let id = watcher.id();
    let schedule = STATE.with(|s| {
        let mut s = s.borrow_mut();
        if !s.has.insert(id) {
            return false;
        }
        if s.flushing {
            let mut i = s.queue.len();
            while i > s.index + 1 && s.queue[i - 1].id() > id {
                i -= 1;
            }
            s.queue.insert(i, watcher);
        } else {
            s.queue.push(watcher);
        }
        !std::mem::replace(&mut s.waiting, true)
    });
    if schedule {
        tick::next_tick(|| {
            flush_scheduler_queue();
            Ok(())
        });
    }
}

/// Queue an instance whose `activated` signal must wait until the current
/// flush has patched the whole tree.
pub fn queue_activated_component(instance: Rc<dyn DeferredActivation>) {
    let schedule = STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.activated.push(instance);
        !std::mem::replace(&mut s.waiting, true)
    });
    if schedule {
        tick::next_tick(|| {
            flush_scheduler_queue();
            Ok(())
        });
    }
}

#[must_use]
pub fn is_flushing() -> bool {
    STATE.with(|s| s.borrow().flushing)
}

/// Number of watchers waiting for (or in) the current flush.
#[must_use]
pub fn queued_len() -> usize {
    STATE.with(|s| s.borrow().queue.len())
}

/// Run every queued watcher. Normally invoked from the tick queue.
pub fn flush_scheduler_queue() {
    let started = Instant::now();
    let max_updates = config::max_update_count();
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.flushing = true;
        s.queue.sort_by_key(Watcher::id);
        s.index = 0;
    });
    tracing::debug!(queued = queued_len(), "scheduler flush start");

    loop {
        let next = STATE.with(|s| {
            let s = s.borrow();
            s.queue.get(s.index).cloned()
        });
        let Some(watcher) = next else {
            break;
        };
        let id = watcher.id();
        let halted = STATE.with(|s| s.borrow().halted.contains(&id));
        if halted {
            STATE.with(|s| {
                let mut s = s.borrow_mut();
                s.has.remove(&id);
                s.index += 1;
            });
            continue;
        }

        watcher.call_before();
        STATE.with(|s| s.borrow_mut().has.remove(&id));
        if let Err(err) = watcher.run() {
            watcher.report(Box::new(err), "scheduler flush");
        }

        let runaway = STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.index += 1;
            if !s.has.contains(&id) {
                return false;
            }
            let count = s.circular.entry(id).or_insert(0);
            *count += 1;
            if *count > max_updates {
                s.halted.insert(id);
                return true;
            }
            false
        });
        if runaway {
            warn_infinite_loop(&watcher);
        }
    }

    let (activated, updated) = reset_scheduler_state();
    call_activated_hooks(&activated);
    call_updated_hooks(&updated);
    tracing::debug!(
        ran = updated.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "scheduler flush done"
    );
}

fn warn_infinite_loop(watcher: &Watcher) {
    let message = if watcher.is_user() {
        format!(
            "You may have an infinite update loop in watcher with expression \"{}\"",
            watcher.expression()
        )
    } else {
        "You may have an infinite update loop in a component render function.".to_string()
    };
    let scope = watcher.owner().and_then(|o| o.error_scope());
    debug::warn(&message, scope.as_deref());
}

fn reset_scheduler_state() -> (Vec<Rc<dyn DeferredActivation>>, Vec<Watcher>) {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        let activated = std::mem::take(&mut s.activated);
        let queue = std::mem::take(&mut s.queue);
        s.has.clear();
        s.circular.clear();
        s.halted.clear();
        s.index = 0;
        s.waiting = false;
        s.flushing = false;
        (activated, queue)
    })
}

fn call_activated_hooks(queue: &[Rc<dyn DeferredActivation>]) {
    for instance in queue {
        instance.flush_activation();
    }
}

fn call_updated_hooks(queue: &[Watcher]) {
    for watcher in queue.iter().rev() {
        if !watcher.is_render() {
            continue;
        }
        if let Some(owner) = watcher.owner() {
            if owner.is_mounted() && !owner.is_destroyed() {
                owner.updated();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::observe;
    use crate::value::Value;
    use std::cell::Cell;

    fn state(pairs: &[(&str, i32)]) -> crate::value::Obj {
        let v = Value::object(pairs.iter().map(|(k, n)| (*k, Value::from(*n))));
        observe(&v, false);
        v.as_obj().unwrap().clone()
    }

    #[test]
    fn repeated_writes_run_once() {
        let obj = state(&[("count", 0)]);
        let runs = Rc::new(Cell::new(0));
        let r = Rc::clone(&runs);
        let o = obj.clone();
        let _w = Watcher::builder(move || {
            r.set(r.get() + 1);
            Ok(o.get("count"))
        })
        .build()
        .unwrap();
        for _ in 0..3 {
            obj.set("count", Value::from(1));
        }
        obj.set("count", Value::from(2));
        assert_eq!(runs.get(), 1);
        tick::run_until_idle();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn flush_runs_in_creation_order() {
        let obj = state(&[("n", 0)]);
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut watchers = Vec::new();
        for label in ["first", "second", "third"] {
            let o = obj.clone();
            let out = Rc::clone(&order);
            watchers.push(
                Watcher::builder(move || Ok(o.get("n")))
                    .callback(move |_, _| {
                        out.borrow_mut().push(label);
                        Ok(())
                    })
                    .build()
                    .unwrap(),
            );
        }
        obj.set("n", Value::from(1));
        tick::run_until_idle();
        assert_eq!(*order.borrow(), ["first", "second", "third"]);
    }

    #[test]
    fn watcher_queued_mid_flush_runs_in_same_flush() {
        let obj = state(&[("a", 0), ("b", 0)]);
        let b_runs = Rc::new(Cell::new(0));

        // Created first, so it sorts first, but it is only triggered by the
        // second watcher's callback.
        let o = obj.clone();
        let br = Rc::clone(&b_runs);
        let _on_b = Watcher::builder(move || Ok(o.get("b")))
            .callback(move |_, _| {
                br.set(br.get() + 1);
                Ok(())
            })
            .build()
            .unwrap();
        let o = obj.clone();
        let writer = obj.clone();
        let _on_a = Watcher::builder(move || Ok(o.get("a")))
            .callback(move |new, _| {
                writer.set("b", new.clone());
                Ok(())
            })
            .build()
            .unwrap();

        obj.set("a", Value::from(5));
        assert_eq!(tick::run_microtasks(), 1);
        assert_eq!(b_runs.get(), 1, "cursor already passed; runs next");
        assert_eq!(obj.get_untracked("b").as_f64(), Some(5.0));
    }

    #[test]
    fn self_requeue_is_cut_off() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&warnings);
        config::set(config::Config::new().with_warn_handler(move |w| {
            sink.borrow_mut().push(w.message.clone());
        }));
        let obj = state(&[("n", 0)]);
        let runs = Rc::new(Cell::new(0usize));
        let o = obj.clone();
        let writer = obj.clone();
        let r = Rc::clone(&runs);
        let _w = Watcher::builder(move || Ok(o.get("n")))
            .expression("n")
            .user()
            .callback(move |new, _| {
                r.set(r.get() + 1);
                writer.set("n", Value::from(new.as_f64().unwrap_or(0.0) + 1.0));
                Ok(())
            })
            .build()
            .unwrap();

        let sibling_runs = Rc::new(Cell::new(0));
        let sr = Rc::clone(&sibling_runs);
        let o = obj.clone();
        let _sibling = Watcher::builder(move || {
            sr.set(sr.get() + 1);
            Ok(o.get("n"))
        })
        .build()
        .unwrap();

        obj.set("n", Value::from(1));
        tick::run_until_idle();

        assert_eq!(runs.get(), config::MAX_UPDATE_COUNT + 1);
        assert!(sibling_runs.get() >= 2, "other watchers still run");
        let warnings = warnings.borrow();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("infinite update loop in watcher with expression \"n\""));
        assert!(!is_flushing());
        config::reset();
    }

    #[test]
    fn failing_user_callback_does_not_block_siblings() {
        config::set(config::Config::new().with_error_handler(|_, _| {}));
        let obj = state(&[("n", 0)]);
        let o = obj.clone();
        let _bad = Watcher::builder(move || Ok(o.get("n")))
            .user()
            .callback(|_, _| Err("boom".into()))
            .build()
            .unwrap();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let o = obj.clone();
        let _good = Watcher::builder(move || Ok(o.get("n")))
            .callback(move |_, _| {
                flag.set(true);
                Ok(())
            })
            .build()
            .unwrap();
        obj.set("n", Value::from(1));
        tick::run_until_idle();
        assert!(ran.get());
        config::reset();
    }
}
