//! Host-visible error shape.
//!
//! Every recoverable failure that crosses the boundary ends up as a
//! [`JsError`]: a stable kind tag plus an optional message.

use std::fmt;

/// The kind of a host-visible error.
///
/// The string form returned by [`ErrorKind::as_str`] is part of the boundary
/// contract and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic error
    Error,
    /// Type error (e.g. awaiting something of the wrong shape)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Error raised by native code at runtime
    RuntimeError,
    /// An operation did not complete within its time limit
    TimeoutError,
    /// Internal bridge failure
    InternalError,
    /// The operation was cancelled through its stop token
    Stopped,
}

impl ErrorKind {
    /// Returns the stable taxonomy tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host-visible error: `(kind, message)`.
///
/// Some kinds carry no message; cancellation is reported as
/// `(Stopped, None)`.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let stopped = JsError::stopped();
/// assert_eq!(stopped.kind, ErrorKind::Stopped);
/// assert!(stopped.message.is_none());
/// assert_eq!(stopped.to_string(), "stopped");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message, absent for some kinds
    pub message: Option<String>,
}

impl JsError {
    /// Creates an error with a message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// Creates an error that carries only its kind.
    pub fn bare(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// The distinguished cancellation error.
    pub fn stopped() -> Self {
        Self::bare(ErrorKind::Stopped)
    }

    /// Returns true if this error reports a cancellation.
    pub fn is_stopped(&self) -> bool {
        self.kind == ErrorKind::Stopped
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for JsError {}
