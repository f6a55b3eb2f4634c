//! Stop tokens.
//!
//! A [`StopSource`] requests a stop at most once. Callbacks registered on its
//! [`StopToken`] run synchronously when that happens, in registration order;
//! a callback registered after the stop runs immediately. Dropping the
//! [`StopRegistration`] returned for a callback unregisters it.
//!
//! Sources created with [`StopSource::child_of`] are stopped together with
//! their parent, never the other way round.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct StopState {
    stopped: Cell<bool>,
    next_id: Cell<u64>,
    callbacks: RefCell<BTreeMap<u64, Callback>>,
    parent_link: RefCell<Option<StopRegistration>>,
}

impl StopState {
    fn request_stop(&self) -> bool {
        if self.stopped.replace(true) {
            return false;
        }
        let callbacks = std::mem::take(&mut *self.callbacks.borrow_mut());
        tracing::trace!(callbacks = callbacks.len(), "stop requested");
        for (_, callback) in callbacks {
            callback();
        }
        self.parent_link.borrow_mut().take();
        true
    }
}

/// Owner side of a stop signal.
///
/// # Examples
///
/// ```
/// use coro_bridge::StopSource;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let source = StopSource::new();
/// let hits = Rc::new(Cell::new(0));
/// let h = hits.clone();
/// let _registration = source.token().on_stop(move || h.set(h.get() + 1));
///
/// assert!(source.request_stop());
/// assert!(!source.request_stop());
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Clone, Default)]
pub struct StopSource {
    state: Rc<StopState>,
}

impl fmt::Debug for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSource")
            .field("stopped", &self.stop_requested())
            .finish()
    }
}

impl StopSource {
    /// Creates a source that has not been stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source that is also stopped when `parent` is.
    pub fn child_of(parent: &StopToken) -> Self {
        let child = Self::new();
        let weak = Rc::downgrade(&child.state);
        let link = parent.on_stop(move || {
            if let Some(state) = weak.upgrade() {
                state.request_stop();
            }
        });
        if !child.stop_requested() {
            *child.state.parent_link.borrow_mut() = Some(link);
        }
        child
    }

    /// The observer side of this source.
    pub fn token(&self) -> StopToken {
        StopToken {
            state: Rc::clone(&self.state),
        }
    }

    /// Requests a stop. Returns false if one was already requested.
    pub fn request_stop(&self) -> bool {
        self.state.request_stop()
    }

    /// Returns true once a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.state.stopped.get()
    }
}

/// Observer side of a stop signal.
#[derive(Clone, Default)]
pub struct StopToken {
    state: Rc<StopState>,
}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken")
            .field("stopped", &self.stop_requested())
            .finish()
    }
}

impl StopToken {
    /// A token that is never stopped.
    pub fn never() -> Self {
        Self::default()
    }

    /// Returns true once a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.state.stopped.get()
    }

    pub(crate) fn registered(&self) -> usize {
        self.state.callbacks.borrow().len()
    }

    /// Runs `callback` when a stop is requested, or now if it already was.
    #[must_use = "dropping the registration unregisters the callback"]
    pub fn on_stop<F>(&self, callback: F) -> StopRegistration
    where
        F: FnOnce() + 'static,
    {
        if self.stop_requested() {
            callback();
            return StopRegistration::inert();
        }
        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);
        self.state.callbacks.borrow_mut().insert(id, Box::new(callback));
        StopRegistration {
            state: Rc::downgrade(&self.state),
            id,
            armed: true,
        }
    }
}

/// Keeps a stop callback registered while alive.
pub struct StopRegistration {
    state: Weak<StopState>,
    id: u64,
    armed: bool,
}

impl StopRegistration {
    fn inert() -> Self {
        Self {
            state: Weak::new(),
            id: 0,
            armed: false,
        }
    }

    /// Leaves the callback registered for the lifetime of the source.
    pub fn detach(mut self) {
        self.armed = false;
    }
}

impl fmt::Debug for StopRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopRegistration")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for StopRegistration {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            let removed = state.callbacks.borrow_mut().remove(&self.id);
            drop(removed);
        }
    }
}
