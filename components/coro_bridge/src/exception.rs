//! Exception marshalling.
//!
//! Native code reports errors by entering a catch site with
//! [`ExceptionMarshaller::catching`]. While inside, the error is the active
//! in-flight exception and can be captured as a transportable payload.

use core_types::{ErrorKind, JsError};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Tracks the in-flight exception of each active catch site.
///
/// Catch sites nest; the innermost one is the active exception.
#[derive(Debug, Clone, Default)]
pub struct ExceptionMarshaller {
    active: Rc<RefCell<Vec<JsError>>>,
}

struct CatchSite<'a> {
    active: &'a RefCell<Vec<JsError>>,
}

impl Drop for CatchSite<'_> {
    fn drop(&mut self) {
        self.active.borrow_mut().pop();
    }
}

impl ExceptionMarshaller {
    /// Creates a marshaller with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `handler` with `error` as the active exception.
    ///
    /// # Examples
    ///
    /// ```
    /// use coro_bridge::ExceptionMarshaller;
    /// use core_types::{ErrorKind, JsError};
    ///
    /// let marshaller = ExceptionMarshaller::new();
    /// let error = JsError::new(ErrorKind::RuntimeError, "test error");
    /// let seen = marshaller.catching(error.clone(), || marshaller.active());
    /// assert_eq!(seen, Some(error));
    /// assert!(marshaller.active().is_none());
    /// ```
    pub fn catching<R>(&self, error: JsError, handler: impl FnOnce() -> R) -> R {
        self.active.borrow_mut().push(error);
        let _site = CatchSite {
            active: &self.active,
        };
        handler()
    }

    /// The innermost in-flight exception, if any.
    pub fn active(&self) -> Option<JsError> {
        self.active.borrow().last().cloned()
    }

    /// Returns true while inside a catch site.
    pub fn in_flight(&self) -> bool {
        !self.active.borrow().is_empty()
    }
}

/// Converts a caught panic into a native `RuntimeError`.
pub fn panic_to_error(payload: Box<dyn Any + Send>) -> JsError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    JsError::new(ErrorKind::RuntimeError, message)
}
