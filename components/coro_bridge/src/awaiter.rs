//! Promise awaiter.
//!
//! Awaiting a host value is a three-party protocol:
//!
//! 1. The coroutine registers a continuation slot and calls
//!    [`Runtime::await_value`], which subscribes to the value on the host
//!    and returns a controller handle.
//! 2. When the value settles the host calls `on_awaiter_resolve` or
//!    `on_awaiter_reject`, which posts a [`Resumption`] to the executor.
//! 3. The executor applies the resumption to the slot and wakes the task.
//!
//! A slot leaves `Pending` exactly once: either a settlement claims it or a
//! stop request does. A settlement for a stopped or abandoned slot is
//! discarded; a second settlement for a slot that was already resumed is a
//! protocol violation and panics, even after the first one was consumed.

use crate::context::TaskContext;
use crate::error::{BridgeError, TaskError};
use crate::handle::{Handle, HandleBridge};
use crate::runtime::Runtime;
use crate::stop::{StopRegistration, StopToken};
use core_types::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Correlates a host-side subscription with the suspended coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContinuationToken(u64);

impl ContinuationToken {
    /// Raw token number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "continuation#{}", self.0)
    }
}

/// How an awaited value settled, as a handle owned by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Fulfilled with the value behind the handle.
    Success(Handle),
    /// Rejected with the payload behind the handle.
    Failure(Handle),
}

impl Settlement {
    /// The handle carried by either variant.
    pub fn handle(&self) -> Handle {
        match self {
            Settlement::Success(h) | Settlement::Failure(h) => *h,
        }
    }
}

/// Message from the host into the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resumption {
    /// Slot to resume
    pub token: ContinuationToken,
    /// What to resume it with
    pub settlement: Settlement,
}

#[derive(Debug)]
enum SlotState {
    Pending,
    // A settlement is on its way through the inbox.
    Claimed,
    Settled(Settlement),
    Stopped,
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    waker: Option<Waker>,
}

/// What a continuation resolved to once it left `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationOutcome {
    /// Resumed by the host; the receiver owns the handle.
    Settled(Settlement),
    /// Stopped or abandoned before any settlement claimed it.
    Stopped,
}

/// Continuation slots of every in-flight await.
#[derive(Debug, Default)]
pub(crate) struct AwaiterRegistry {
    next: Cell<u64>,
    slots: RefCell<HashMap<ContinuationToken, Slot>>,
    // Tokens whose slot went away without ever being resumed. Any other
    // issued token without a slot was resumed already.
    abandoned: RefCell<HashSet<ContinuationToken>>,
}

impl AwaiterRegistry {
    pub(crate) fn register(&self) -> ContinuationToken {
        let token = ContinuationToken(self.next.get());
        self.next.set(token.0 + 1);
        self.slots.borrow_mut().insert(
            token,
            Slot {
                state: SlotState::Pending,
                waker: None,
            },
        );
        token
    }

    /// Reserves the slot for a settlement. Returns false if the settlement
    /// must be discarded because the await was stopped or abandoned, or the
    /// token was never issued.
    ///
    /// # Panics
    ///
    /// If an earlier settlement already claimed the token, whether or not it
    /// was consumed since.
    pub(crate) fn claim(&self, token: ContinuationToken) -> bool {
        let mut slots = self.slots.borrow_mut();
        let Some(slot) = slots.get_mut(&token) else {
            if token.0 >= self.next.get() || self.abandoned.borrow().contains(&token) {
                return false;
            }
            panic!("{}", BridgeError::DoubleResumption(token))
        };
        match slot.state {
            SlotState::Pending => {
                slot.state = SlotState::Claimed;
                true
            }
            SlotState::Stopped => false,
            SlotState::Claimed | SlotState::Settled(_) => {
                panic!("{}", BridgeError::DoubleResumption(token))
            }
        }
    }

    /// Stores a claimed settlement and wakes the awaiting task. Hands the
    /// settlement back if nobody is waiting for it any more.
    pub(crate) fn deliver(&self, resumption: Resumption) -> Option<Settlement> {
        let waker = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(&resumption.token) else {
                return Some(resumption.settlement);
            };
            match slot.state {
                SlotState::Pending | SlotState::Claimed => {
                    slot.state = SlotState::Settled(resumption.settlement);
                    slot.waker.take()
                }
                SlotState::Stopped | SlotState::Settled(_) => return Some(resumption.settlement),
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        None
    }

    /// Moves a pending slot to `Stopped` and wakes its task. A slot that a
    /// settlement already claimed keeps that settlement.
    pub(crate) fn stop(&self, token: ContinuationToken) -> bool {
        let waker = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&token) {
                Some(slot) if matches!(slot.state, SlotState::Pending) => {
                    slot.state = SlotState::Stopped;
                    slot.waker.take()
                }
                _ => return false,
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Takes the outcome of a slot, or records `waker` if there is none yet.
    pub(crate) fn poll(&self, token: ContinuationToken, waker: &Waker) -> Poll<ContinuationOutcome> {
        if let Poll::Ready(outcome) = self.take(token) {
            return Poll::Ready(outcome);
        }
        if let Some(slot) = self.slots.borrow_mut().get_mut(&token) {
            let stale = slot
                .waker
                .as_ref()
                .map_or(true, |current| !current.will_wake(waker));
            if stale {
                slot.waker = Some(waker.clone());
            }
        }
        Poll::Pending
    }

    /// Takes the outcome of a slot without touching its waker. A missing
    /// slot reads as stopped.
    pub(crate) fn take(&self, token: ContinuationToken) -> Poll<ContinuationOutcome> {
        let mut slots = self.slots.borrow_mut();
        let Some(slot) = slots.get(&token) else {
            return Poll::Ready(ContinuationOutcome::Stopped);
        };
        let outcome = match slot.state {
            SlotState::Settled(settlement) => ContinuationOutcome::Settled(settlement),
            SlotState::Stopped => {
                self.abandoned.borrow_mut().insert(token);
                ContinuationOutcome::Stopped
            }
            SlotState::Pending | SlotState::Claimed => return Poll::Pending,
        };
        slots.remove(&token);
        Poll::Ready(outcome)
    }

    /// Forgets a slot, handing back a settlement nobody consumed.
    pub(crate) fn remove(&self, token: ContinuationToken) -> Option<Settlement> {
        let slot = self.slots.borrow_mut().remove(&token)?;
        match slot.state {
            SlotState::Settled(settlement) => Some(settlement),
            SlotState::Claimed => None,
            SlotState::Pending | SlotState::Stopped => {
                self.abandoned.borrow_mut().insert(token);
                None
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn clear(&self) -> Vec<Settlement> {
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        let mut abandoned = self.abandoned.borrow_mut();
        let mut unclaimed = Vec::new();
        for (token, slot) in slots {
            match slot.state {
                SlotState::Settled(settlement) => unclaimed.push(settlement),
                SlotState::Claimed => {}
                SlotState::Pending | SlotState::Stopped => {
                    abandoned.insert(token);
                }
            }
        }
        unclaimed
    }
}

enum AwaitState {
    Init(Handle),
    Waiting {
        token: ContinuationToken,
        controller: Handle,
        _on_stop: StopRegistration,
    },
    Done,
}

/// Future returned by [`TaskContext::await_value`].
///
/// Resolves with the settled value, fails with [`TaskError::Rejected`]
/// carrying the rejection payload, or with [`TaskError::Stopped`] if the
/// task's stop token fires first. Dropping it before it resolves abandons
/// the host subscription.
#[must_use = "futures do nothing unless awaited"]
pub struct ValueAwait {
    runtime: Runtime,
    stop: StopToken,
    state: AwaitState,
}

impl fmt::Debug for ValueAwait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            AwaitState::Init(handle) => format!("Init({})", handle),
            AwaitState::Waiting { token, .. } => format!("Waiting({})", token),
            AwaitState::Done => "Done".to_string(),
        };
        f.debug_struct("ValueAwait").field("state", &state).finish()
    }
}

impl ValueAwait {
    /// Takes ownership of one reference to `handle`.
    pub(crate) fn new(cx: &TaskContext, handle: Handle) -> Self {
        Self {
            runtime: cx.runtime().clone(),
            stop: cx.stop_token().clone(),
            state: AwaitState::Init(handle),
        }
    }

    fn start(&mut self, handle: Handle) -> Result<(), TaskError> {
        let handles = self.runtime.handles();
        if self.stop.stop_requested() {
            release_quietly(handles, handle);
            return Err(TaskError::Stopped);
        }
        let registry = self.runtime.awaiters();
        let token = registry.register();
        let controller = self.runtime.await_value(handle, token);
        release_quietly(handles, handle);
        let controller = match controller {
            Ok(controller) => controller,
            Err(err) => {
                registry.remove(token);
                return Err(err.into());
            }
        };

        let weak = self.runtime.downgrade();
        let on_stop = self.stop.on_stop(move || {
            if let Some(runtime) = weak.upgrade() {
                tracing::debug!(%token, "await stopped");
                runtime.abort_controller(controller);
                runtime.awaiters().stop(token);
            }
        });
        self.state = AwaitState::Waiting {
            token,
            controller,
            _on_stop: on_stop,
        };
        Ok(())
    }

    fn finish(&mut self, outcome: ContinuationOutcome) -> Result<Value, TaskError> {
        let previous = std::mem::replace(&mut self.state, AwaitState::Done);
        if let AwaitState::Waiting { controller, .. } = previous {
            release_quietly(self.runtime.handles(), controller);
        }
        let handles = self.runtime.handles();
        match outcome {
            ContinuationOutcome::Settled(Settlement::Success(h)) => Ok(handles.take(h)?),
            ContinuationOutcome::Settled(Settlement::Failure(h)) => {
                Err(TaskError::Rejected(handles.take(h)?))
            }
            ContinuationOutcome::Stopped => Err(TaskError::Stopped),
        }
    }
}

impl Future for ValueAwait {
    type Output = Result<Value, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // No field is structurally pinned.
        let this = self.get_mut();
        if let AwaitState::Init(handle) = this.state {
            this.state = AwaitState::Done;
            if let Err(err) = this.start(handle) {
                return Poll::Ready(Err(err));
            }
        }
        let token = match &this.state {
            AwaitState::Waiting { token, .. } => *token,
            AwaitState::Init(_) | AwaitState::Done => {
                panic!("ValueAwait polled after completion")
            }
        };
        match this.runtime.awaiters().poll(token, cx.waker()) {
            Poll::Ready(outcome) => Poll::Ready(this.finish(outcome)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ValueAwait {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, AwaitState::Done) {
            AwaitState::Init(handle) => release_quietly(self.runtime.handles(), handle),
            AwaitState::Waiting {
                token,
                controller,
                _on_stop: registration,
            } => {
                tracing::trace!(%token, "await abandoned");
                drop(registration);
                if let Some(unclaimed) = self.runtime.awaiters().remove(token) {
                    release_quietly(self.runtime.handles(), unclaimed.handle());
                }
                if let Err(err) = self.runtime.abandon(controller) {
                    tracing::debug!(%err, "abandon on drop failed");
                }
            }
            AwaitState::Done => {}
        }
    }
}

pub(crate) fn release_quietly(handles: &HandleBridge, handle: Handle) {
    if let Err(err) = handles.release(handle) {
        tracing::debug!(%err, "release failed");
    }
}
