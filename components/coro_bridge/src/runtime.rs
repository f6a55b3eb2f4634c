//! The bridge runtime and its boundary surface.
//!
//! A [`Runtime`] binds the handle table, the awaiter registry, the exception
//! marshaller and the executor to one host [`EventLoop`]. Everything the host
//! and native sides say to each other goes through its methods; there is no
//! process-wide state.

use crate::awaiter::{
    release_quietly, AwaiterRegistry, ContinuationOutcome, ContinuationToken, Resumption,
    Settlement,
};
use crate::config::RuntimeConfig;
use crate::error::{BridgeError, TaskError};
use crate::exception::ExceptionMarshaller;
use crate::executor::Executor;
use crate::handle::{Handle, HandleBridge};
use crate::timer::CancellableTimer;
use async_runtime::{AbortController, Driver, EventLoop, Promise, Reject, Resolve};
use core_types::{JsError, ObjectRef, Value};
use crossbeam::channel::{unbounded, Sender};
use std::fmt;
use std::rc::{Rc, Weak};
use std::task::Poll;

struct RuntimeInner {
    host: EventLoop,
    handles: HandleBridge,
    exceptions: ExceptionMarshaller,
    awaiters: Rc<AwaiterRegistry>,
    executor: Rc<Executor>,
    resumptions: Sender<Resumption>,
    config: RuntimeConfig,
}

/// Shared handle on the bridge state. Clones refer to the same runtime.
///
/// Task frames keep the runtime alive; call [`Runtime::shutdown`] to drop
/// them and detach from the host loop.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

#[derive(Clone)]
pub(crate) struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("handles", &self.inner.handles.len())
            .field("awaiters", &self.inner.awaiters.len())
            .field("executor", &self.inner.executor)
            .field("config", &self.inner.config)
            .finish()
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::NativeObject(obj) => obj.class_name(),
        other => other.type_of(),
    }
}

impl Runtime {
    /// Creates a runtime with the default configuration and registers its
    /// executor with `host`.
    pub fn new(host: &EventLoop) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    /// Creates a runtime with `config`.
    pub fn with_config(host: &EventLoop, config: RuntimeConfig) -> Self {
        let (resumptions, inbox) = unbounded();
        let handles = HandleBridge::new();
        let awaiters = Rc::new(AwaiterRegistry::default());
        let executor = Rc::new(Executor::new(
            inbox,
            Rc::clone(&awaiters),
            handles.clone(),
            config.max_polls_per_turn,
        ));
        host.register_driver(executor.clone());
        tracing::debug!(?config, "runtime attached to event loop");
        Self {
            inner: Rc::new(RuntimeInner {
                host: host.clone(),
                handles,
                exceptions: ExceptionMarshaller::new(),
                awaiters,
                executor,
                resumptions,
                config,
            }),
        }
    }

    /// The host event loop.
    pub fn host(&self) -> &EventLoop {
        &self.inner.host
    }

    /// The handle table.
    pub fn handles(&self) -> &HandleBridge {
        &self.inner.handles
    }

    /// The exception marshaller.
    pub fn exceptions(&self) -> &ExceptionMarshaller {
        &self.inner.exceptions
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Number of spawned tasks that have not completed.
    pub fn pending_tasks(&self) -> usize {
        self.inner.executor.task_count()
    }

    /// Number of awaits currently registered.
    pub fn pending_awaits(&self) -> usize {
        self.inner.awaiters.len()
    }

    pub(crate) fn awaiters(&self) -> &AwaiterRegistry {
        &self.inner.awaiters
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Creates a pending host promise and returns its handle together with
    /// the capabilities that settle it.
    pub fn make_promise(&self) -> (Handle, Resolve, Reject) {
        let (promise, resolve, reject) = Promise::with_resolvers(self.host());
        (self.handles().to_handle(promise.to_value()), resolve, reject)
    }

    /// Subscribes continuation `token` to the value behind `handle`.
    ///
    /// Promises and thenables are followed; any other value counts as
    /// already fulfilled. The caller keeps its reference to `handle`. The
    /// returned controller handle abandons the subscription when passed to
    /// [`Runtime::abandon`]; callbacks arriving after that are dropped.
    pub fn await_value(
        &self,
        handle: Handle,
        token: ContinuationToken,
    ) -> Result<Handle, BridgeError> {
        let target = self.handles().to_value(handle)?;
        let promise = Promise::from_value(self.host(), target);
        let controller = AbortController::new();

        let (signal, runtime) = (controller.signal(), self.downgrade());
        let (fail_signal, fail_runtime) = (signal.clone(), runtime.clone());
        promise.subscribe(
            move |value| {
                if signal.aborted() {
                    tracing::trace!(%token, "fulfilled after abandon, dropped");
                    return;
                }
                if let Some(runtime) = runtime.upgrade() {
                    let handle = runtime.handles().to_handle(value);
                    runtime.on_awaiter_resolve(token, handle);
                }
            },
            move |reason| {
                if fail_signal.aborted() {
                    tracing::trace!(%token, "rejected after abandon, dropped");
                    return;
                }
                if let Some(runtime) = fail_runtime.upgrade() {
                    let handle = runtime.handles().to_handle(reason);
                    runtime.on_awaiter_reject(token, handle);
                }
            },
        );
        Ok(self
            .handles()
            .to_handle(Value::NativeObject(ObjectRef::new(controller))))
    }

    /// Abandons the subscription behind `controller` and releases the
    /// controller handle.
    pub fn abandon(&self, controller: Handle) -> Result<(), BridgeError> {
        self.controller_for(controller)?.abort();
        self.handles().release(controller)
    }

    /// Registers a continuation for a caller that drives
    /// [`Runtime::await_value`] itself instead of awaiting inside a task.
    pub fn register_continuation(&self) -> ContinuationToken {
        self.awaiters().register()
    }

    /// Takes the outcome of `token` once it left pending, applying queued
    /// resumptions first. Returns `None` while it is still pending. The
    /// caller owns the handle of a returned settlement. A forgotten or
    /// already taken token reads as stopped.
    pub fn take_continuation(&self, token: ContinuationToken) -> Option<ContinuationOutcome> {
        self.executor().drain_inbox();
        match self.awaiters().take(token) {
            Poll::Ready(outcome) => Some(outcome),
            Poll::Pending => None,
        }
    }

    /// Forgets `token` without resuming it. Settlements that arrive for it
    /// afterwards are discarded and their handles released.
    pub fn forget_continuation(&self, token: ContinuationToken) {
        if let Some(unclaimed) = self.awaiters().remove(token) {
            release_quietly(self.handles(), unclaimed.handle());
        }
    }

    pub(crate) fn abort_controller(&self, controller: Handle) -> bool {
        match self.controller_for(controller) {
            Ok(controller) => controller.abort(),
            Err(err) => {
                tracing::debug!(%err, "abort skipped");
                false
            }
        }
    }

    fn controller_for(&self, handle: Handle) -> Result<AbortController, BridgeError> {
        let value = self.handles().to_value(handle)?;
        value
            .as_object()
            .and_then(|obj| obj.downcast_ref::<AbortController>().cloned())
            .ok_or(BridgeError::WrongType {
                handle,
                expected: "AbortController",
                found: describe(&value),
            })
    }

    /// Resumes `token` with the value behind `value`, taking ownership of
    /// the handle.
    ///
    /// # Panics
    ///
    /// If `token` was already resumed.
    pub fn on_awaiter_resolve(&self, token: ContinuationToken, value: Handle) {
        self.resume(token, Settlement::Success(value));
    }

    /// Resumes `token` with the rejection payload behind `error`, taking
    /// ownership of the handle.
    ///
    /// # Panics
    ///
    /// If `token` was already resumed.
    pub fn on_awaiter_reject(&self, token: ContinuationToken, error: Handle) {
        self.resume(token, Settlement::Failure(error));
    }

    fn resume(&self, token: ContinuationToken, settlement: Settlement) {
        if !self.awaiters().claim(token) {
            tracing::debug!(%token, "discarding resumption for abandoned await");
            release_quietly(self.handles(), settlement.handle());
            return;
        }
        if let Err(err) = self.inner.resumptions.send(Resumption { token, settlement }) {
            release_quietly(self.handles(), err.into_inner().settlement.handle());
        }
    }

    /// Starts a cancellable timer and returns its handle.
    pub fn start_timer(&self, duration_ms: u64) -> Handle {
        let timer = CancellableTimer::start(self.host(), duration_ms);
        self.handles()
            .to_handle(Value::NativeObject(ObjectRef::from_rc(timer)))
    }

    /// Cancels the timer behind `handle`. Returns false if it already fired
    /// or was cancelled.
    pub fn cancel_timer(&self, handle: Handle) -> Result<bool, BridgeError> {
        Ok(self.timer_for(handle)?.cancel())
    }

    /// The timer behind `handle`.
    pub fn timer_for(&self, handle: Handle) -> Result<Rc<CancellableTimer>, BridgeError> {
        let value = self.handles().to_value(handle)?;
        value
            .as_object()
            .and_then(|obj| obj.downcast::<CancellableTimer>())
            .ok_or(BridgeError::WrongType {
                handle,
                expected: "CancellableTimer",
                found: describe(&value),
            })
    }

    /// Runs `handler` with `error` in flight, as a catch site would.
    pub fn catching<R>(&self, error: JsError, handler: impl FnOnce() -> R) -> R {
        self.exceptions().catching(error, handler)
    }

    /// Captures the in-flight exception as a payload handle.
    ///
    /// # Panics
    ///
    /// If called outside a catch site.
    pub fn capture_active_exception(&self) -> Handle {
        match self.try_capture_active_exception() {
            Ok(handle) => handle,
            Err(err) => panic!("capture_active_exception: {}", err),
        }
    }

    /// Captures the in-flight exception, failing if there is none.
    pub fn try_capture_active_exception(&self) -> Result<Handle, BridgeError> {
        let error = self
            .exceptions()
            .active()
            .ok_or(BridgeError::NoActiveException)?;
        Ok(self.handles().to_handle(Value::Error(error)))
    }

    /// Converts a native error into the payload a host rejection carries.
    pub fn marshal_error(&self, error: JsError) -> Value {
        let handle = self.catching(error.clone(), || self.capture_active_exception());
        self.handles().take(handle).unwrap_or(Value::Error(error))
    }

    /// The rejection payload reported to the host for a failed task.
    pub fn rejection_payload(&self, err: TaskError) -> Value {
        match err {
            TaskError::Rejected(payload) => payload,
            TaskError::Stopped => Value::Error(JsError::stopped()),
            TaskError::Native { kind, message } => self.marshal_error(JsError::new(kind, message)),
        }
    }

    /// Drops every task frame, abandoning whatever they were awaiting, and
    /// detaches the executor from the host loop.
    pub fn shutdown(&self) {
        let driver: Rc<dyn Driver> = self.inner.executor.clone();
        self.host().detach_driver(&driver);
        self.executor().clear();
        for unclaimed in self.awaiters().clear() {
            release_quietly(self.handles(), unclaimed.handle());
        }
        tracing::debug!(live_handles = self.handles().len(), "runtime shut down");
    }
}
