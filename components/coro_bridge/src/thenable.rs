//! Task-to-thenable adapter.
//!
//! [`Runtime::spawn_promise`] runs a coroutine on the executor and exposes
//! its completion to the host as a [`TaskPromise`]: a host object that the
//! host can await like any promise and that can be cancelled explicitly.

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::exception::panic_to_error;
use crate::runtime::Runtime;
use crate::stop::StopSource;
use async_runtime::{Function, Promise, PromiseState};
use core_types::{HostObject, ObjectRef, Value};
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Host-visible completion of a spawned task.
///
/// Fulfils with the task's value. Rejects with the task's rejection
/// payload, with `("stopped", None)` after [`TaskPromise::cancel`], or with
/// a `RuntimeError` carrying the message of a panic.
#[derive(Debug, Clone)]
pub struct TaskPromise {
    promise: Promise,
    stop: StopSource,
}

impl HostObject for TaskPromise {
    fn class_name(&self) -> &'static str {
        "TaskPromise"
    }

    fn thenable(&self) -> Option<ObjectRef> {
        Some(self.promise.to_object())
    }
}

impl TaskPromise {
    /// Recovers a task promise from a host value.
    pub fn from_value(value: &Value) -> Option<TaskPromise> {
        value.as_object()?.downcast_ref::<TaskPromise>().cloned()
    }

    /// The underlying host promise.
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Settlement state of the task.
    pub fn state(&self) -> PromiseState {
        self.promise.state()
    }

    /// Value or rejection payload, once settled.
    pub fn result(&self) -> Option<Value> {
        self.promise.result()
    }

    /// Cancels the task. Returns false if it already completed or was
    /// cancelled before. A task whose body returned a promise that has not
    /// settled yet counts as completed.
    pub fn cancel(&self) -> bool {
        if self.promise.is_locked() {
            return false;
        }
        self.stop.request_stop()
    }

    /// See [`Promise::then`].
    pub fn then(&self, on_fulfilled: Option<Function>, on_rejected: Option<Function>) -> Promise {
        self.promise.then(on_fulfilled, on_rejected)
    }

    /// Host value referencing this task.
    pub fn to_value(&self) -> Value {
        Value::NativeObject(ObjectRef::new(self.clone()))
    }
}

impl Runtime {
    /// Spawns `body` as a top-level task.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_runtime::EventLoop;
    /// use coro_bridge::Runtime;
    /// use core_types::Value;
    ///
    /// let host = EventLoop::new();
    /// let runtime = Runtime::new(&host);
    /// let task = runtime.spawn_promise(|cx| async move {
    ///     cx.sleep(100).await?;
    ///     Ok(Value::Smi(42))
    /// });
    ///
    /// host.run_until_done().unwrap();
    /// assert_eq!(task.result(), Some(Value::Smi(42)));
    /// assert_eq!(host.now(), 100);
    /// ```
    pub fn spawn_promise<F, Fut>(&self, body: F) -> TaskPromise
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<Value, TaskError>> + 'static,
    {
        self.spawn_with_source(StopSource::new(), body)
    }

    pub(crate) fn spawn_with_source<F, Fut>(&self, stop: StopSource, body: F) -> TaskPromise
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<Value, TaskError>> + 'static,
    {
        let (promise, resolve, reject) = Promise::with_resolvers(self.host());
        let frame = AssertUnwindSafe(body(TaskContext::new(self.clone(), stop.token())));
        let runtime = self.downgrade();
        self.executor().spawn(async move {
            let outcome = match frame.catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Err(TaskError::from(panic_to_error(panic))),
            };
            match outcome {
                Ok(value) => resolve.resolve(value),
                Err(err) => {
                    tracing::debug!(%err, "task failed");
                    let payload = match runtime.upgrade() {
                        Some(runtime) => runtime.rejection_payload(err),
                        None => Value::Error(err.to_js_error()),
                    };
                    reject.reject(payload);
                }
            }
        });
        TaskPromise { promise, stop }
    }
}
