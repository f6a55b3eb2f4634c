//! Abort controllers and signals.
//!
//! A signal flips to aborted at most once; listeners registered before that
//! run exactly once, listeners registered afterwards run immediately.

use crate::event_loop::EventLoop;
use core_types::{ErrorKind, HostObject, JsError, ObjectRef, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener = Box<dyn FnOnce()>;

#[derive(Default)]
struct SignalState {
    aborted: Cell<bool>,
    reason: RefCell<Option<Value>>,
    listeners: RefCell<Vec<Listener>>,
    guards: RefCell<Vec<Box<dyn Any>>>,
}

/// Read side of an abort: observable flag plus listeners.
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Rc<SignalState>,
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.aborted())
            .field("reason", &self.reason())
            .finish()
    }
}

impl HostObject for AbortSignal {
    fn class_name(&self) -> &'static str {
        "AbortSignal"
    }
}

impl AbortSignal {
    /// A signal that aborts with a `TimeoutError` after `ms` milliseconds.
    pub fn timeout(host: &EventLoop, ms: u64) -> Self {
        let signal = Self::default();
        let target = signal.clone();
        host.set_timeout(ms, move || {
            let reason = JsError::new(ErrorKind::TimeoutError, "signal timed out");
            target.abort(Value::Error(reason));
            Ok(())
        });
        signal
    }

    /// A signal that aborts as soon as any of `signals` aborts, with the same
    /// reason.
    pub fn any(signals: &[AbortSignal]) -> Self {
        let combined = Self::default();
        for signal in signals {
            if signal.aborted() {
                combined.abort(signal.reason().unwrap_or(Value::Undefined));
                return combined;
            }
        }
        for signal in signals {
            let target = combined.clone();
            let source = signal.clone();
            signal.on_abort(move || {
                target.abort(source.reason().unwrap_or(Value::Undefined));
            });
        }
        combined
    }

    /// Returns true once the signal has been aborted.
    pub fn aborted(&self) -> bool {
        self.state.aborted.get()
    }

    /// The abort reason, once aborted.
    pub fn reason(&self) -> Option<Value> {
        self.state.reason.borrow().clone()
    }

    /// Runs `listener` when the signal aborts, or right away if it already
    /// has.
    pub fn on_abort<F>(&self, listener: F)
    where
        F: FnOnce() + 'static,
    {
        if self.aborted() {
            listener();
        } else {
            self.state.listeners.borrow_mut().push(Box::new(listener));
        }
    }

    /// Keeps `guard` alive until the signal aborts or its last clone is
    /// dropped, whichever happens first.
    pub fn hold<G: Any>(&self, guard: G) {
        if !self.aborted() {
            self.state.guards.borrow_mut().push(Box::new(guard));
        }
    }

    /// Host value referencing a copy of this signal.
    pub fn to_value(&self) -> Value {
        Value::NativeObject(ObjectRef::new(self.clone()))
    }

    fn abort(&self, reason: Value) -> bool {
        if self.state.aborted.replace(true) {
            return false;
        }
        *self.state.reason.borrow_mut() = Some(reason);
        let listeners = std::mem::take(&mut *self.state.listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
        let guards = std::mem::take(&mut *self.state.guards.borrow_mut());
        drop(guards);
        true
    }
}

/// Write side of an abort.
///
/// # Examples
///
/// ```
/// use async_runtime::AbortController;
///
/// let controller = AbortController::new();
/// let signal = controller.signal();
/// assert!(!signal.aborted());
/// assert!(controller.abort());
/// assert!(!controller.abort());
/// assert!(signal.aborted());
/// ```
#[derive(Clone, Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl HostObject for AbortController {
    fn class_name(&self) -> &'static str {
        "AbortController"
    }
}

impl AbortController {
    /// Creates a controller with a fresh, non-aborted signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal observed by whoever this controller may abort.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Aborts with an `("Error", "aborted")` reason. Returns false if the
    /// signal was already aborted.
    pub fn abort(&self) -> bool {
        self.abort_with(Value::Error(JsError::new(ErrorKind::Error, "aborted")))
    }

    /// Aborts with a caller-supplied reason.
    pub fn abort_with(&self, reason: Value) -> bool {
        self.signal.abort(reason)
    }

    /// A reference that does not keep the controller alive.
    pub fn downgrade(&self) -> WeakAbortController {
        WeakAbortController {
            state: Rc::downgrade(&self.signal.state),
        }
    }
}

/// Non-owning reference to an [`AbortController`].
#[derive(Clone, Debug, Default)]
pub struct WeakAbortController {
    state: Weak<SignalState>,
}

impl WeakAbortController {
    /// The controller, if any clone of it or of its signal is still alive.
    pub fn upgrade(&self) -> Option<AbortController> {
        let state = self.state.upgrade()?;
        Some(AbortController {
            signal: AbortSignal { state },
        })
    }
}
