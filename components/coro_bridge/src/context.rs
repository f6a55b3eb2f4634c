//! Per-task context.

use crate::awaiter::ValueAwait;
use crate::error::TaskError;
use crate::handle::Handle;
use crate::runtime::Runtime;
use crate::stop::{StopSource, StopToken};
use crate::thenable::TaskPromise;
use crate::timer::CancelOnDrop;
use async_runtime::{AbortController, AbortSignal};
use core_types::{JsError, Value};
use std::future::Future;

/// What a task body gets to talk to the host with.
///
/// Every await made through the same context observes the task's stop
/// token, so cancelling the task reaches whichever await is outstanding.
#[derive(Debug, Clone)]
pub struct TaskContext {
    runtime: Runtime,
    stop: StopToken,
}

impl TaskContext {
    pub(crate) fn new(runtime: Runtime, stop: StopToken) -> Self {
        Self { runtime, stop }
    }

    /// The runtime this task runs on.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The task's stop token.
    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    /// Returns true once the task has been cancelled.
    pub fn is_stopped(&self) -> bool {
        self.stop.stop_requested()
    }

    /// Suspends until the value behind `handle` settles. Consumes one
    /// reference to `handle`.
    pub fn await_value(&self, handle: Handle) -> ValueAwait {
        ValueAwait::new(self, handle)
    }

    /// Suspends until `value` settles.
    pub fn await_host(&self, value: Value) -> ValueAwait {
        let handle = self.runtime.handles().to_handle(value);
        self.await_value(handle)
    }

    /// Suspends for `ms` milliseconds of host time. Cancelling the task
    /// cancels the underlying timer.
    pub async fn sleep(&self, ms: u64) -> Result<(), TaskError> {
        let handle = self.runtime.start_timer(ms);
        let timer = self.runtime.timer_for(handle)?;
        let _cancel = CancelOnDrop(timer);
        self.await_value(handle).await?;
        Ok(())
    }

    /// A signal that aborts when this task is cancelled, or after
    /// `timeout_ms` if given, whichever happens first.
    ///
    /// The link to the task's stop token lasts until the signal aborts or
    /// every clone of it is dropped.
    pub fn abort_signal(&self, timeout_ms: Option<u64>) -> AbortSignal {
        let controller = AbortController::new();
        let target = controller.downgrade();
        let registration = self.stop.on_stop(move || {
            if let Some(controller) = target.upgrade() {
                controller.abort_with(Value::Error(JsError::stopped()));
            }
        });
        let signal = match timeout_ms {
            Some(ms) => AbortSignal::any(&[
                controller.signal(),
                AbortSignal::timeout(self.runtime.host(), ms),
            ]),
            None => controller.signal(),
        };
        signal.hold(registration);
        signal
    }

    /// Spawns a child task that is cancelled together with this one.
    pub fn spawn<F, Fut>(&self, body: F) -> TaskPromise
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<Value, TaskError>> + 'static,
    {
        self.runtime
            .spawn_with_source(StopSource::child_of(&self.stop), body)
    }
}
