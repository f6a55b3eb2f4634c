//! Error types for the coroutine bridge.
//!
//! [`BridgeError`] covers misuse of the handle table and boundary calls.
//! [`TaskError`] is what a suspended coroutine observes when it resumes
//! without a value.

use crate::awaiter::ContinuationToken;
use crate::handle::Handle;
use core_types::{ErrorKind, JsError, Value};
use thiserror::Error;

/// Failures of the boundary surface itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The handle was never issued or has already been released.
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    /// The handle refers to a host value of another kind.
    #[error("handle {handle} refers to {found}, expected {expected}")]
    WrongType {
        /// Offending handle
        handle: Handle,
        /// Kind the operation needs
        expected: &'static str,
        /// Kind that was found
        found: &'static str,
    },

    /// An exception was captured outside of a catch site.
    #[error("no exception is in flight")]
    NoActiveException,

    /// A continuation token was resumed more than once.
    #[error("continuation {0} resumed twice")]
    DoubleResumption(ContinuationToken),
}

/// Why an awaited operation did not produce a value.
///
/// # Examples
///
/// ```
/// use coro_bridge::TaskError;
/// use core_types::{ErrorKind, JsError};
///
/// let err = TaskError::runtime("test error");
/// assert_eq!(err.to_string(), "RuntimeError: test error");
/// assert_eq!(TaskError::from(JsError::stopped()), TaskError::Stopped);
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    /// The producer failed; carries its rejection payload untouched.
    #[error("rejected with {0}")]
    Rejected(Value),

    /// The await was abandoned through the task's stop token.
    #[error("stopped")]
    Stopped,

    /// An error raised on the native side.
    #[error("{kind}: {message}")]
    Native {
        /// Error kind tag
        kind: ErrorKind,
        /// Error message
        message: String,
    },
}

impl TaskError {
    /// A native `RuntimeError` with `message`.
    pub fn runtime(message: impl Into<String>) -> Self {
        TaskError::Native {
            kind: ErrorKind::RuntimeError,
            message: message.into(),
        }
    }

    /// Returns true for the cancellation outcome.
    pub fn is_stopped(&self) -> bool {
        matches!(self, TaskError::Stopped)
    }

    /// The host-visible `(kind, message)` shape of this error.
    ///
    /// Rejections that do not carry an error object are reported as a
    /// generic `Error` with the payload rendered as the message.
    pub fn to_js_error(&self) -> JsError {
        match self {
            TaskError::Rejected(Value::Error(err)) => err.clone(),
            TaskError::Rejected(other) => JsError::new(ErrorKind::Error, other.to_string()),
            TaskError::Stopped => JsError::stopped(),
            TaskError::Native { kind, message } => JsError::new(*kind, message.clone()),
        }
    }
}

impl From<JsError> for TaskError {
    fn from(err: JsError) -> Self {
        if err.is_stopped() {
            return TaskError::Stopped;
        }
        TaskError::Native {
            kind: err.kind,
            message: err.message.unwrap_or_default(),
        }
    }
}

impl From<BridgeError> for TaskError {
    fn from(err: BridgeError) -> Self {
        TaskError::Native {
            kind: ErrorKind::InternalError,
            message: err.to_string(),
        }
    }
}
