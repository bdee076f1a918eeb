#![forbid(unsafe_code)]

//! Deferred execution: `next_tick` and the task queues behind it.
//!
//! There is no ambient event loop. Work deferred "until after the current
//! synchronous turn" is queued here and executed when the embedder drives
//! the loop with [`run_microtasks`], [`run_next_macrotask`] or
//! [`run_until_idle`].
//!
//! [`next_tick`] collects callbacks into one pending batch. The first
//! callback of a batch schedules exactly one flush on the microtask queue,
//! or on the macrotask queue while inside [`with_macro_task`] (used for
//! updates triggered from host event handlers, so they flush after any
//! microtasks that event dispatch itself queued).
//!
//! # Invariants
//!
//! 1. Callbacks run in submission order.
//! 2. A callback scheduled while a batch is flushing lands in the next
//!    batch.
//! 3. All microtasks (including ones queued while draining) run before the
//!    next macrotask.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use fvue_core::{BoxError, ErrorScope, handle_error};

type Task = Box<dyn FnOnce()>;
type TickCallback = Box<dyn FnOnce() -> Result<(), BoxError>>;

struct PendingCallback {
    run: TickCallback,
    scope: Option<Rc<dyn ErrorScope>>,
}

#[derive(Default)]
struct TickState {
    callbacks: Vec<PendingCallback>,
    microtasks: VecDeque<Task>,
    macrotasks: VecDeque<Task>,
}

thread_local! {
    static STATE: RefCell<TickState> = RefCell::new(TickState::default());
    static PENDING: Cell<bool> = const { Cell::new(false) };
    static USE_MACRO_TASK: Cell<bool> = const { Cell::new(false) };
}

/// Queue `task` to run after the current synchronous work.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    STATE.with(|s| s.borrow_mut().microtasks.push_back(Box::new(task)));
}

/// Queue `task` as a separate, lower-priority turn.
pub fn queue_macrotask(task: impl FnOnce() + 'static) {
    STATE.with(|s| s.borrow_mut().macrotasks.push_back(Box::new(task)));
}

/// Defer `cb` to the next tick.
pub fn next_tick(cb: impl FnOnce() -> Result<(), BoxError> + 'static) {
    next_tick_in(None, cb);
}

/// Defer `cb` to the next tick; failures are reported against `scope`.
pub fn next_tick_in(
    scope: Option<Rc<dyn ErrorScope>>,
    cb: impl FnOnce() -> Result<(), BoxError> + 'static,
) {
    STATE.with(|s| {
        s.borrow_mut().callbacks.push(PendingCallback {
            run: Box::new(cb),
            scope,
        });
    });
    if PENDING.with(|p| p.replace(true)) {
        return;
    }
    if USE_MACRO_TASK.with(Cell::get) {
        queue_macrotask(flush_callbacks);
    } else {
        queue_microtask(flush_callbacks);
    }
}

/// Run `f` with next-tick flushes forced onto the macrotask queue.
pub fn with_macro_task<R>(f: impl FnOnce() -> R) -> R {
    let previous = USE_MACRO_TASK.with(|u| u.replace(true));
    let out = f();
    USE_MACRO_TASK.with(|u| u.set(previous));
    out
}

fn flush_callbacks() {
    PENDING.with(|p| p.set(false));
    let batch = STATE.with(|s| std::mem::take(&mut s.borrow_mut().callbacks));
    for PendingCallback { run, scope } in batch {
        if let Err(err) = run() {
            handle_error(err, scope.as_deref(), "nextTick");
        }
    }
}

/// Drain the microtask queue. Returns how many tasks ran.
pub fn run_microtasks() -> usize {
    let mut ran = 0;
    loop {
        let next = STATE.with(|s| s.borrow_mut().microtasks.pop_front());
        let Some(task) = next else {
            return ran;
        };
        task();
        ran += 1;
    }
}

/// Run one macrotask followed by every microtask it produced.
/// Returns false when no macrotask was queued.
pub fn run_next_macrotask() -> bool {
    let next = STATE.with(|s| s.borrow_mut().macrotasks.pop_front());
    match next {
        Some(task) => {
            task();
            run_microtasks();
            true
        }
        None => false,
    }
}

/// Drive the loop until both queues are empty.
pub fn run_until_idle() {
    run_microtasks();
    while run_next_macrotask() {}
}

#[must_use]
pub fn has_pending() -> bool {
    STATE.with(|s| {
        let s = s.borrow();
        !s.microtasks.is_empty() || !s.macrotasks.is_empty() || !s.callbacks.is_empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn callbacks_batch_into_one_flush() {
        let out = log();
        for name in ["a", "b", "c"] {
            let o = Rc::clone(&out);
            next_tick(move || {
                o.borrow_mut().push(name);
                Ok(())
            });
        }
        assert!(out.borrow().is_empty());
        assert_eq!(run_microtasks(), 1);
        assert_eq!(*out.borrow(), ["a", "b", "c"]);
    }

    #[test]
    fn nested_next_tick_runs_in_a_later_batch() {
        let out = log();
        let o = Rc::clone(&out);
        next_tick(move || {
            o.borrow_mut().push("outer");
            let o2 = Rc::clone(&o);
            next_tick(move || {
                o2.borrow_mut().push("inner");
                Ok(())
            });
            Ok(())
        });
        assert_eq!(run_microtasks(), 2);
        assert_eq!(*out.borrow(), ["outer", "inner"]);
    }

    #[test]
    fn macro_task_mode_defers_behind_microtasks() {
        let out = log();
        let o = Rc::clone(&out);
        with_macro_task(|| {
            next_tick(move || {
                o.borrow_mut().push("tick");
                Ok(())
            });
        });
        let o = Rc::clone(&out);
        queue_microtask(move || o.borrow_mut().push("micro"));
        run_until_idle();
        assert_eq!(*out.borrow(), ["micro", "tick"]);
        assert!(!has_pending());
    }

    #[test]
    fn failing_callback_does_not_stop_batch() {
        let errors = Rc::new(Cell::new(0));
        let sink = Rc::clone(&errors);
        fvue_core::config::set(fvue_core::Config::new().with_error_handler(move |_, ctx| {
            assert_eq!(ctx.info, "nextTick");
            sink.set(sink.get() + 1);
        }));
        let out = log();
        next_tick(|| Err("bad".into()));
        let o = Rc::clone(&out);
        next_tick(move || {
            o.borrow_mut().push("after");
            Ok(())
        });
        run_until_idle();
        assert_eq!(errors.get(), 1);
        assert_eq!(*out.borrow(), ["after"]);
        fvue_core::config::reset();
    }
}
