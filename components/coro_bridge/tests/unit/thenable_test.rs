//! Unit tests for the task-to-thenable adapter

use async_runtime::{EventLoop, Function, Promise, PromiseState};
use coro_bridge::{Runtime, TaskError, TaskPromise};
use core_types::{ErrorKind, JsError, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn host_can_await_the_task_value() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let task = runtime.spawn_promise(|cx| async move {
        cx.sleep(5).await?;
        Ok(Value::Smi(3))
    });
    let doubled = Promise::from_value(&host, task.to_value()).then(
        Some(Function::new(|v| match v {
            Value::Smi(n) => Ok(Value::Smi(n * 2)),
            other => Err(other),
        })),
        None,
    );
    host.run_until_done().unwrap();
    assert_eq!(doubled.result(), Some(Value::Smi(6)));
}

#[test]
fn native_error_is_marshalled() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let task = runtime.spawn_promise(|_| async { Err(TaskError::runtime("test error")) });
    host.run_until_done().unwrap();
    let error = task.result().and_then(|v| v.as_error().cloned());
    assert_eq!(error, Some(JsError::new(ErrorKind::RuntimeError, "test error")));
    assert!(!runtime.exceptions().in_flight());
    assert!(runtime.handles().is_empty());
}

#[test]
fn cancel_reaches_nested_tasks() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let inner: Rc<RefCell<Option<TaskPromise>>> = Rc::default();

    let slot = inner.clone();
    let parent = runtime.spawn_promise(move |cx| async move {
        let child = cx.spawn(|cx| async move {
            cx.sleep(1_000).await?;
            Ok(Value::Smi(1))
        });
        *slot.borrow_mut() = Some(child.clone());
        cx.await_host(child.to_value()).await
    });
    host.run_until_done().unwrap();
    assert_eq!(host.pending_timers(), 1);

    parent.cancel();
    host.run_until_done().unwrap();
    let child_state = inner.borrow().as_ref().map(|child| child.state());

    assert_eq!(parent.result(), Some(Value::Error(JsError::stopped())));
    assert_eq!(child_state, Some(PromiseState::Rejected));
    assert_eq!(host.pending_timers(), 0);
    assert_eq!(host.now(), 0);
}

#[test]
fn cancelling_a_child_leaves_the_parent_running() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let parent = runtime.spawn_promise(|cx| async move {
        let child = cx.spawn(|cx| async move {
            cx.sleep(100).await?;
            Ok(Value::Smi(1))
        });
        child.cancel();
        match cx.await_host(child.to_value()).await {
            Err(TaskError::Rejected(Value::Error(e))) if e.is_stopped() => {
                Ok(Value::from("child stopped"))
            }
            other => other,
        }
    });
    host.run_until_done().unwrap();
    assert_eq!(parent.result(), Some(Value::from("child stopped")));
}

#[test]
fn stopped_rejection_has_no_message() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let (never, _, _) = runtime.make_promise();
    let task = runtime.spawn_promise(move |cx| async move { cx.await_value(never).await });
    host.run_until_done().unwrap();
    task.cancel();
    host.run_until_done().unwrap();

    let error = task.result().and_then(|v| v.as_error().cloned()).unwrap();
    assert_eq!(error.kind.as_str(), "stopped");
    assert_eq!(error.message, None);
}

#[test]
fn cancel_is_a_no_op_once_the_body_returned_a_pending_promise() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let (inner, resolve_inner, _) = Promise::with_resolvers(&host);
    let returned = inner.to_value();
    let task = runtime.spawn_promise(move |_| async move { Ok(returned) });
    host.run_until_done().unwrap();
    assert_eq!(task.state(), PromiseState::Pending);
    assert_eq!(runtime.pending_tasks(), 0);

    assert!(!task.cancel());
    resolve_inner.resolve(Value::Smi(5));
    host.run_until_done().unwrap();
    assert_eq!(task.result(), Some(Value::Smi(5)));
}
