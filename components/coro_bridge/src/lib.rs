//! Coroutine bridge for a single-threaded host event loop.
//!
//! Native coroutines (Rust futures) run on an executor that the host
//! [`EventLoop`](async_runtime::EventLoop) drives between its turns. A
//! coroutine suspends on a host value, typically a promise or a timer, and
//! resumes with its fulfilment value or with its rejection as an error. Tasks
//! are handed back to the host as promise-like objects that can be
//! cancelled; cancellation reaches whatever the task is suspended on.
//!
//! # Overview
//!
//! - [`HandleBridge`] - reference-counted handles for host values
//! - [`CancellableTimer`] - delayed settlement that can be called off
//! - [`ExceptionMarshaller`] - in-flight native errors as rejection payloads
//! - [`ValueAwait`] - the promise awaiter
//! - [`TaskPromise`] - a task exposed as a cancellable thenable
//! - [`Runtime`] - binds all of the above to one event loop
//!
//! # Examples
//!
//! ```
//! use async_runtime::{EventLoop, Promise};
//! use coro_bridge::Runtime;
//! use core_types::Value;
//!
//! let host = EventLoop::new();
//! let runtime = Runtime::new(&host);
//!
//! let task = runtime.spawn_promise(|cx| async move {
//!     cx.sleep(100).await?;
//!     Ok(Value::Smi(42))
//! });
//!
//! let (fast, resolve, _) = Promise::with_resolvers(&host);
//! host.set_timeout(50, move || {
//!     resolve.resolve(Value::Smi(11));
//!     Ok(())
//! });
//!
//! let slow = Promise::from_value(&host, task.to_value());
//! let race = Promise::race(&host, &[slow, fast]);
//! host.run_until_done().unwrap();
//!
//! assert_eq!(race.result(), Some(Value::Smi(11)));
//! assert_eq!(task.result(), Some(Value::Smi(42)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod awaiter;
pub mod combinators;
pub mod config;
pub mod context;
pub mod error;
pub mod exception;
pub mod executor;
pub mod handle;
pub mod runtime;
pub mod stop;
pub mod thenable;
pub mod timer;

pub use awaiter::{ContinuationOutcome, ContinuationToken, Resumption, Settlement, ValueAwait};
pub use config::RuntimeConfig;
pub use context::TaskContext;
pub use error::{BridgeError, TaskError};
pub use exception::{panic_to_error, ExceptionMarshaller};
pub use executor::{Executor, TaskId};
pub use handle::{Handle, HandleBridge};
pub use runtime::Runtime;
pub use stop::{StopRegistration, StopSource, StopToken};
pub use thenable::TaskPromise;
pub use timer::{AsyncState, CancellableTimer};
