//! Cancellable timer.
//!
//! A timer owns a host promise that fulfils with `undefined` when the delay
//! expires. Cancelling first removes the scheduled callback and abandons the
//! promise: it stays pending forever and no subscriber is ever called.
//! Expiry and cancellation race for the same owned state; whichever takes it
//! first decides the outcome and the other becomes a no-op.

use async_runtime::{EventLoop, Promise, PromiseState, Resolve, TimerId};
use core_types::{HostObject, ObjectRef, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Observable state of an asynchronous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncState {
    /// Not settled yet
    Pending,
    /// Settled with a value
    Fulfilled,
    /// Settled with an error
    Rejected,
    /// Will never settle
    Abandoned,
}

#[derive(Debug)]
enum TimerState {
    Scheduled(Resolve),
    Fired,
    Cancelled,
}

/// Takes the resolver out of a scheduled timer, leaving `next` behind.
fn claim(state: &RefCell<TimerState>, next: TimerState) -> Option<Resolve> {
    let mut state = state.borrow_mut();
    if !matches!(*state, TimerState::Scheduled(_)) {
        return None;
    }
    match std::mem::replace(&mut *state, next) {
        TimerState::Scheduled(resolve) => Some(resolve),
        TimerState::Fired | TimerState::Cancelled => None,
    }
}

/// A delayed settlement that can be called off.
///
/// # Examples
///
/// ```
/// use async_runtime::EventLoop;
/// use coro_bridge::{AsyncState, CancellableTimer};
///
/// let host = EventLoop::new();
/// let timer = CancellableTimer::start(&host, 100);
/// assert!(timer.cancel());
/// assert!(!timer.cancel());
///
/// host.run_until_done().unwrap();
/// assert_eq!(timer.state(), AsyncState::Abandoned);
/// ```
#[derive(Debug)]
pub struct CancellableTimer {
    host: EventLoop,
    id: TimerId,
    duration_ms: u64,
    promise: Promise,
    state: Rc<RefCell<TimerState>>,
}

impl HostObject for CancellableTimer {
    fn class_name(&self) -> &'static str {
        "CancellableTimer"
    }

    fn thenable(&self) -> Option<ObjectRef> {
        Some(self.promise.to_object())
    }
}

impl CancellableTimer {
    /// Schedules a timer that fires after `duration_ms` milliseconds.
    pub fn start(host: &EventLoop, duration_ms: u64) -> Rc<Self> {
        let (promise, resolve, _reject) = Promise::with_resolvers(host);
        let state = Rc::new(RefCell::new(TimerState::Scheduled(resolve)));
        let shared = Rc::clone(&state);
        let id = host.set_timeout(duration_ms, move || {
            if let Some(resolve) = claim(&shared, TimerState::Fired) {
                resolve.resolve(Value::Undefined);
            }
            Ok(())
        });
        tracing::trace!(%id, duration_ms, "timer started");
        Rc::new(Self {
            host: host.clone(),
            id,
            duration_ms,
            promise,
            state,
        })
    }

    /// Calls the timer off. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&self) -> bool {
        match claim(&self.state, TimerState::Cancelled) {
            Some(resolve) => {
                self.host.clear_timeout(self.id);
                // The resolver is dropped unused; the promise never settles.
                drop(resolve);
                tracing::debug!(id = %self.id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Current state of the timer's value.
    pub fn state(&self) -> AsyncState {
        match &*self.state.borrow() {
            TimerState::Cancelled => AsyncState::Abandoned,
            TimerState::Scheduled(_) | TimerState::Fired => match self.promise.state() {
                PromiseState::Pending => AsyncState::Pending,
                PromiseState::Fulfilled => AsyncState::Fulfilled,
                PromiseState::Rejected => AsyncState::Rejected,
            },
        }
    }

    /// The promise settled by expiry.
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Host timer id backing this timer.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Configured delay.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Cancels a timer when dropped; a no-op once the timer has fired.
#[derive(Debug)]
pub(crate) struct CancelOnDrop(pub(crate) Rc<CancellableTimer>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
