//! Host value types shared by the event loop and the coroutine bridge.
//!
//! This crate provides the foundational types that cross the boundary between
//! the host event loop and the native coroutine runtime.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of host values
//! - [`ObjectRef`] - Shared, identity-compared reference to a host object
//! - [`HostObject`] - Trait implemented by every host object kind
//! - [`JsError`] - The `(kind, message)` error shape visible to the host
//! - [`ErrorKind`] - Stable taxonomy of error kinds
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let error = JsError::new(ErrorKind::RuntimeError, "test error");
//! assert_eq!(error.kind.as_str(), "RuntimeError");
//! assert_eq!(error.message.as_deref(), Some("test error"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod object;
mod value;

pub use error::{ErrorKind, JsError};
pub use object::{AsAny, HostObject, ObjectRef};
pub use value::Value;
