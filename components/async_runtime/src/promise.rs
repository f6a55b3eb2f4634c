//! Promise implementation following the Promise/A+ specification.
//!
//! This module provides the host Promise with proper state management,
//! chaining, thenable adoption and `race`. Reactions always run as
//! microtasks on the owning [`EventLoop`].

use crate::event_loop::EventLoop;
use crate::task_queue::MicroTask;
use core_types::{ErrorKind, HostObject, JsError, ObjectRef, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been resolved with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

/// A reaction handler.
///
/// `Ok` continues the chain with a value, `Err` rejects it with a reason.
pub struct Function {
    callback: Box<dyn FnOnce(Value) -> Result<Value, Value>>,
}

impl Function {
    /// Creates a new Function from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, Value> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Calls the function with the settled value.
    pub fn call(self, arg: Value) -> Result<Value, Value> {
        (self.callback)(arg)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function {{ ... }}")
    }
}

/// A reaction to be triggered when a Promise settles.
///
/// This represents the handlers registered via `.then()`.
#[derive(Debug)]
pub struct PromiseReaction {
    /// Settles the promise returned by `.then()`, if any
    pub chained: Option<(Resolve, Reject)>,
    /// Handler for fulfilled state
    pub on_fulfilled: Option<Function>,
    /// Handler for rejected state
    pub on_rejected: Option<Function>,
}

impl PromiseReaction {
    fn run(self, state: PromiseState, value: Value) {
        let handler = match state {
            PromiseState::Fulfilled => self.on_fulfilled,
            PromiseState::Rejected => self.on_rejected,
            PromiseState::Pending => return,
        };
        let outcome = match handler {
            Some(handler) => handler.call(value),
            None if state == PromiseState::Fulfilled => Ok(value),
            None => Err(value),
        };
        if let Some((resolve, reject)) = self.chained {
            match outcome {
                Ok(value) => resolve.resolve(value),
                Err(reason) => reject.reject(reason),
            }
        }
    }
}

/// Shared state behind a [`Promise`]; this is the host object identity.
pub struct PromiseCell {
    host: EventLoop,
    state: Cell<PromiseState>,
    // Set once a resolve/reject capability has been used, even if the
    // promise is still pending while it follows another thenable.
    locked: Cell<bool>,
    result: RefCell<Option<Value>>,
    reactions: RefCell<Vec<PromiseReaction>>,
}

impl fmt::Debug for PromiseCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state.get())
            .field("result", &self.result.borrow())
            .field("reactions", &self.reactions.borrow().len())
            .finish()
    }
}

impl HostObject for PromiseCell {
    fn class_name(&self) -> &'static str {
        "Promise"
    }
}

/// A host Promise.
///
/// Promises represent the eventual completion (or failure) of an asynchronous
/// operation and its resulting value. Clones refer to the same promise.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, PromiseState};
/// use core_types::Value;
///
/// let host = EventLoop::new();
/// let (promise, resolve, _reject) = Promise::with_resolvers(&host);
/// assert_eq!(promise.state(), PromiseState::Pending);
///
/// resolve.resolve(Value::Smi(42));
/// resolve.resolve(Value::Smi(7)); // ignored
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
/// assert_eq!(promise.result(), Some(Value::Smi(42)));
/// ```
#[derive(Clone)]
pub struct Promise {
    cell: Rc<PromiseCell>,
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.cell, f)
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Promise {
    /// Creates a new pending Promise bound to `host`.
    pub fn new(host: &EventLoop) -> Self {
        Self {
            cell: Rc::new(PromiseCell {
                host: host.clone(),
                state: Cell::new(PromiseState::Pending),
                locked: Cell::new(false),
                result: RefCell::new(None),
                reactions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Creates a pending Promise together with its resolve and reject
    /// capabilities.
    pub fn with_resolvers(host: &EventLoop) -> (Self, Resolve, Reject) {
        let promise = Self::new(host);
        let resolve = Resolve {
            promise: promise.clone(),
        };
        let reject = Reject {
            promise: promise.clone(),
        };
        (promise, resolve, reject)
    }

    /// Creates a Promise already fulfilled with `value`.
    pub fn resolved(host: &EventLoop, value: Value) -> Self {
        let promise = Self::new(host);
        promise.settle(PromiseState::Fulfilled, value);
        promise
    }

    /// Creates a Promise already rejected with `reason`.
    pub fn rejected(host: &EventLoop, reason: Value) -> Self {
        let promise = Self::new(host);
        promise.settle(PromiseState::Rejected, reason);
        promise
    }

    /// `Promise.resolve` semantics: promises pass through unchanged, objects
    /// exposing a thenable are followed, anything else becomes a fulfilled
    /// promise.
    pub fn from_value(host: &EventLoop, value: Value) -> Self {
        if let Value::NativeObject(obj) = &value {
            if let Some(promise) = Self::from_object(obj) {
                return promise;
            }
            if let Some(inner) = obj.thenable() {
                return Self::from_value(host, Value::NativeObject(inner));
            }
        }
        Self::resolved(host, value)
    }

    /// Recovers the Promise behind a host object reference.
    pub fn from_object(obj: &ObjectRef) -> Option<Self> {
        obj.downcast::<PromiseCell>().map(|cell| Self { cell })
    }

    /// Returns a Promise that settles like the first of `promises` to settle.
    ///
    /// With no inputs the result stays pending forever.
    pub fn race(host: &EventLoop, promises: &[Promise]) -> Self {
        let (race, resolve, reject) = Self::with_resolvers(host);
        for promise in promises {
            let resolve = resolve.clone();
            let reject = reject.clone();
            promise.subscribe(
                move |value| resolve.resolve(value),
                move |reason| reject.reject(reason),
            );
        }
        race
    }

    /// The event loop this promise schedules its reactions on.
    pub fn host(&self) -> &EventLoop {
        &self.cell.host
    }

    /// Current state.
    pub fn state(&self) -> PromiseState {
        self.cell.state.get()
    }

    /// Returns true once a resolve or reject capability has been used. A
    /// locked promise may still be pending while it follows another
    /// thenable, but its outcome can no longer be changed by its own
    /// capabilities.
    pub fn is_locked(&self) -> bool {
        self.cell.locked.get()
    }

    /// Returns true if the promise has settled either way.
    pub fn is_settled(&self) -> bool {
        self.state() != PromiseState::Pending
    }

    /// The fulfillment value or rejection reason, once settled.
    pub fn result(&self) -> Option<Value> {
        self.cell.result.borrow().clone()
    }

    /// Checks if there are pending reactions.
    pub fn has_pending_reactions(&self) -> bool {
        !self.cell.reactions.borrow().is_empty()
    }

    /// Host value referencing this promise.
    pub fn to_value(&self) -> Value {
        Value::NativeObject(self.to_object())
    }

    /// Host object reference with this promise's identity.
    pub fn to_object(&self) -> ObjectRef {
        ObjectRef::from_rc(Rc::clone(&self.cell))
    }

    /// Adds handlers for fulfillment and/or rejection.
    ///
    /// Returns a new Promise resolved with the handler's result, or
    /// rejected with its error.
    pub fn then(&self, on_fulfilled: Option<Function>, on_rejected: Option<Function>) -> Promise {
        let (chained, resolve, reject) = Self::with_resolvers(self.host());
        self.add_reaction(PromiseReaction {
            chained: Some((resolve, reject)),
            on_fulfilled,
            on_rejected,
        });
        chained
    }

    /// Registers a success and a failure callback; exactly one of them runs,
    /// once, as a microtask after the promise settles.
    pub fn subscribe<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(Value) + 'static,
        F: FnOnce(Value) + 'static,
    {
        self.add_reaction(PromiseReaction {
            chained: None,
            on_fulfilled: Some(Function::new(move |value| {
                on_success(value);
                Ok(Value::Undefined)
            })),
            on_rejected: Some(Function::new(move |reason| {
                on_failure(reason);
                Ok(Value::Undefined)
            })),
        });
    }

    fn add_reaction(&self, reaction: PromiseReaction) {
        match self.state() {
            PromiseState::Pending => self.cell.reactions.borrow_mut().push(reaction),
            state => {
                let value = self.result().unwrap_or(Value::Undefined);
                self.schedule_reaction(reaction, state, value);
            }
        }
    }

    fn schedule_reaction(&self, reaction: PromiseReaction, state: PromiseState, value: Value) {
        self.host().enqueue_microtask(MicroTask::new(move || {
            reaction.run(state, value);
            Ok(())
        }));
    }

    fn settle(&self, state: PromiseState, value: Value) -> bool {
        if self.is_settled() {
            tracing::debug!(?state, "ignoring settlement of an already settled promise");
            return false;
        }
        self.cell.locked.set(true);
        self.cell.state.set(state);
        *self.cell.result.borrow_mut() = Some(value.clone());
        let reactions = std::mem::take(&mut *self.cell.reactions.borrow_mut());
        for reaction in reactions {
            self.schedule_reaction(reaction, state, value.clone());
        }
        true
    }

    fn lock(&self) -> bool {
        if self.cell.locked.replace(true) {
            tracing::debug!("ignoring resolver call on an already resolved promise");
            return false;
        }
        true
    }

    fn resolve_with(&self, value: Value) {
        if !self.lock() {
            return;
        }
        let target = value.as_object().and_then(|obj| {
            Self::from_object(obj)
                .or_else(|| obj.thenable().map(|inner| Self::from_value(self.host(), inner.into())))
        });
        match target {
            Some(target) if target == *self => {
                let error = JsError::new(ErrorKind::TypeError, "promise resolved with itself");
                self.settle(PromiseState::Rejected, Value::Error(error));
            }
            Some(target) => {
                let fulfil = self.clone();
                let fail = self.clone();
                target.subscribe(
                    move |value| {
                        fulfil.settle(PromiseState::Fulfilled, value);
                    },
                    move |reason| {
                        fail.settle(PromiseState::Rejected, reason);
                    },
                );
            }
            None => {
                self.settle(PromiseState::Fulfilled, value);
            }
        }
    }

    fn reject_with(&self, reason: Value) {
        if self.lock() {
            self.settle(PromiseState::Rejected, reason);
        }
    }
}

/// The resolve capability of a promise. Calls after the first are ignored.
#[derive(Clone)]
pub struct Resolve {
    promise: Promise,
}

impl Resolve {
    /// Resolves the promise, adopting `value`'s state if it is a promise.
    pub fn resolve(&self, value: Value) {
        self.promise.resolve_with(value);
    }
}

impl fmt::Debug for Resolve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolve {{ ... }}")
    }
}

/// The reject capability of a promise. Calls after the first are ignored.
#[derive(Clone)]
pub struct Reject {
    promise: Promise,
}

impl Reject {
    /// Rejects the promise with `reason`.
    pub fn reject(&self, reason: Value) {
        self.promise.reject_with(reason);
    }
}

impl fmt::Debug for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reject {{ ... }}")
    }
}
