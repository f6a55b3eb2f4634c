//! Event loop implementation.
//!
//! This module provides the host event loop that coordinates tasks, microtasks
//! and timers on a single thread, plus the [`Driver`] hook through which a
//! native scheduler gets to run between host turns.

use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerId, TimerQueue};
use core_types::JsError;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Outcome of one [`Driver::run_ready`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Everything runnable was run.
    Idle,
    /// The driver stopped early to give the host a turn; it still has work.
    Yielded,
}

/// A native scheduler driven by the event loop.
///
/// Between host turns the loop alternates draining microtasks and running
/// drivers that report work, until both are quiet.
pub trait Driver {
    /// Returns true if the driver has something runnable.
    fn has_work(&self) -> bool;

    /// Runs what is runnable right now.
    fn run_ready(&self) -> DriverStatus;
}

#[derive(Default)]
struct LoopState {
    task_queue: RefCell<TaskQueue>,
    microtask_queue: RefCell<MicrotaskQueue>,
    timers: RefCell<TimerQueue>,
    now: Cell<u64>,
    drivers: RefCell<Vec<Rc<dyn Driver>>>,
}

/// The host event loop.
///
/// Each iteration (turn) of the loop:
/// 1. Drains all microtasks and lets registered drivers run
/// 2. Takes the oldest task, or the earliest due timer, and executes it
/// 3. Repeats
///
/// Time is virtual: the clock jumps to the due time of the next timer when
/// nothing else is runnable, so timer-heavy code runs instantly and
/// deterministically.
///
/// `EventLoop` is a cheap handle; clones share the same queues.
///
/// # Examples
///
/// ```
/// use async_runtime::EventLoop;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let event_loop = EventLoop::new();
/// let fired_at = Rc::new(Cell::new(0));
///
/// let f = fired_at.clone();
/// let host = event_loop.clone();
/// event_loop.set_timeout(50, move || {
///     f.set(host.now());
///     Ok(())
/// });
///
/// event_loop.run_until_done().unwrap();
/// assert_eq!(fired_at.get(), 50);
/// ```
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<LoopState>,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.inner.now.get())
            .field("tasks", &self.inner.task_queue.borrow().len())
            .field("microtasks", &self.inner.microtask_queue.borrow().len())
            .field("timers", &self.inner.timers.borrow().len())
            .field("drivers", &self.inner.drivers.borrow().len())
            .finish()
    }
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues and the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.inner.now.get()
    }

    /// Returns true if both handles refer to the same loop.
    pub fn ptr_eq(&self, other: &EventLoop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&self, task: Task) {
        self.inner.task_queue.borrow_mut().enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    ///
    /// The microtask will be executed after the current task completes.
    pub fn enqueue_microtask(&self, microtask: MicroTask) {
        self.inner.microtask_queue.borrow_mut().enqueue(microtask);
    }

    /// Schedules `f` to run once `delay_ms` milliseconds have passed.
    pub fn set_timeout<F>(&self, delay_ms: u64, f: F) -> TimerId
    where
        F: FnOnce() -> Result<(), JsError> + 'static,
    {
        let due = self.now().saturating_add(delay_ms);
        self.inner.timers.borrow_mut().schedule(due, Task::new(f))
    }

    /// Removes a scheduled timer. Returns false if it already fired or was
    /// cleared before.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }

    /// Returns true if the timer has neither fired nor been cleared.
    pub fn is_timer_pending(&self, id: TimerId) -> bool {
        self.inner.timers.borrow().is_pending(id)
    }

    /// Registers a native scheduler to run between host turns.
    pub fn register_driver(&self, driver: Rc<dyn Driver>) {
        self.inner.drivers.borrow_mut().push(driver);
    }

    /// Removes a previously registered driver.
    pub fn detach_driver(&self, driver: &Rc<dyn Driver>) {
        self.inner
            .drivers
            .borrow_mut()
            .retain(|d| !std::ptr::addr_eq(Rc::as_ptr(d), Rc::as_ptr(driver)));
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.inner.task_queue.borrow().is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.inner.microtask_queue.borrow().is_empty()
    }

    /// Returns the number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Returns true if nothing is queued, no timer is pending and no driver
    /// has work.
    pub fn is_idle(&self) -> bool {
        self.is_task_queue_empty()
            && self.is_microtask_queue_empty()
            && self.pending_timers() == 0
            && !self.has_driver_work()
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// New microtasks added during execution are also processed before this
    /// method returns.
    pub fn run_all_microtasks(&self) -> Result<(), JsError> {
        loop {
            // The borrow ends before the microtask runs so it can enqueue more.
            let next = self.inner.microtask_queue.borrow_mut().dequeue();
            match next {
                Some(microtask) => microtask.run()?,
                None => return Ok(()),
            }
        }
    }

    /// Runs all tasks in the queue (without processing microtasks between them).
    ///
    /// This is primarily for testing purposes.
    pub fn run_all_tasks(&self) -> Result<(), JsError> {
        loop {
            let next = self.inner.task_queue.borrow_mut().dequeue();
            match next {
                Some(task) => task.run()?,
                None => return Ok(()),
            }
        }
    }

    /// Drains microtasks and runs drivers until both are quiet, or until a
    /// driver yields.
    pub fn run_microtask_checkpoint(&self) -> Result<(), JsError> {
        self.run_all_microtasks()?;
        loop {
            let busy: Vec<Rc<dyn Driver>> = self
                .inner
                .drivers
                .borrow()
                .iter()
                .filter(|d| d.has_work())
                .cloned()
                .collect();
            if busy.is_empty() {
                return Ok(());
            }
            let mut yielded = false;
            for driver in busy {
                if driver.run_ready() == DriverStatus::Yielded {
                    yielded = true;
                }
            }
            self.run_all_microtasks()?;
            if yielded {
                return Ok(());
            }
        }
    }

    /// Processes one complete cycle: a microtask checkpoint, one task (or the
    /// earliest timer, advancing the clock), then another checkpoint.
    ///
    /// Returns false if there was nothing to run at all.
    pub fn process_one_cycle(&self) -> Result<bool, JsError> {
        self.run_microtask_checkpoint()?;
        let ran = self.run_next_macrotask(u64::MAX)?;
        self.run_microtask_checkpoint()?;
        Ok(ran || self.has_driver_work())
    }

    /// Runs the event loop until all tasks, timers, microtasks and driver work
    /// are processed.
    ///
    /// # Returns
    ///
    /// `Ok(())` if everything completed, or the first uncaught error.
    pub fn run_until_done(&self) -> Result<(), JsError> {
        while self.process_one_cycle()? {}
        Ok(())
    }

    /// Runs everything that becomes due within the next `ms` milliseconds and
    /// leaves the clock at `now + ms`.
    pub fn advance_by(&self, ms: u64) -> Result<(), JsError> {
        let target = self.now().saturating_add(ms);
        loop {
            self.run_microtask_checkpoint()?;
            if self.run_next_macrotask(target)? || self.has_driver_work() {
                continue;
            }
            break;
        }
        self.inner.now.set(target.max(self.now()));
        self.run_microtask_checkpoint()
    }

    /// Drops every queued task, microtask, timer and driver.
    ///
    /// Closures owned by the queues are destroyed, which releases whatever
    /// they captured.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.inner.task_queue.borrow_mut());
        let microtasks = std::mem::take(&mut *self.inner.microtask_queue.borrow_mut());
        let timers = std::mem::take(&mut *self.inner.timers.borrow_mut());
        let drivers = std::mem::take(&mut *self.inner.drivers.borrow_mut());
        // Dropped outside the borrows: destructors may touch the loop again.
        drop((tasks, microtasks, timers, drivers));
    }

    fn has_driver_work(&self) -> bool {
        self.inner.drivers.borrow().iter().any(|d| d.has_work())
    }

    fn run_next_macrotask(&self, limit: u64) -> Result<bool, JsError> {
        let task = self.inner.task_queue.borrow_mut().dequeue();
        if let Some(task) = task {
            task.run()?;
            return Ok(true);
        }
        let timer = self.inner.timers.borrow_mut().pop_due(limit);
        match timer {
            Some((due, id, task)) => {
                if due > self.now() {
                    self.inner.now.set(due);
                }
                tracing::trace!(%id, now = self.now(), "timer fired");
                task.run()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
