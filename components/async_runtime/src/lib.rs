//! Host environment for the coroutine bridge.
//!
//! This crate provides the single-threaded, externally owned side of the
//! bridge:
//! - Event loop with task, microtask and timer queues on a virtual clock
//! - Promise implementation following the Promise/A+ specification
//! - Abort controllers and signals
//!
//! # Overview
//!
//! - [`EventLoop`] - Main event loop coordinating task execution
//! - [`Promise`] - Promise/A+ compliant implementation
//! - [`AbortController`] - One-shot abort signalling
//! - [`Driver`] - Hook for a native scheduler that runs between host turns
//!
//! # Examples
//!
//! ## Event Loop Usage
//!
//! ```
//! use async_runtime::{EventLoop, Task};
//!
//! let event_loop = EventLoop::new();
//! event_loop.enqueue_task(Task::new(|| Ok(())));
//! event_loop.run_until_done().unwrap();
//! ```
//!
//! ## Promise Usage
//!
//! ```
//! use async_runtime::{EventLoop, Promise, PromiseState};
//! use core_types::Value;
//!
//! let host = EventLoop::new();
//! let (fast, resolve_fast, _) = Promise::with_resolvers(&host);
//! let (slow, resolve_slow, _) = Promise::with_resolvers(&host);
//! let race = Promise::race(&host, &[slow, fast]);
//!
//! resolve_fast.resolve(Value::Smi(11));
//! resolve_slow.resolve(Value::Smi(42));
//! host.run_until_done().unwrap();
//! assert_eq!(race.state(), PromiseState::Fulfilled);
//! assert_eq!(race.result(), Some(Value::Smi(11)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abort;
pub mod event_loop;
pub mod promise;
pub mod task_queue;

// Re-export main types at crate root
pub use abort::{AbortController, AbortSignal, WeakAbortController};
pub use event_loop::{Driver, DriverStatus, EventLoop};
pub use promise::{Function, Promise, PromiseCell, PromiseReaction, PromiseState, Reject, Resolve};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue, TimerId, TimerQueue};
