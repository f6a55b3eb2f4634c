//! Host/task interplay scenarios
//!
//! Each test drives a host event loop and a bridge runtime together and
//! checks the settlements the host observes.

use async_runtime::{EventLoop, Promise, PromiseState};
use coro_bridge::{Runtime, TaskError};
use core_types::{ErrorKind, JsError, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn setup() -> (EventLoop, Runtime) {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    (host, runtime)
}

fn host_timer(host: &EventLoop, ms: u64, value: Value) -> Promise {
    let (promise, resolve, _) = Promise::with_resolvers(host);
    host.set_timeout(ms, move || {
        resolve.resolve(value);
        Ok(())
    });
    promise
}

fn expect_error(value: Option<Value>) -> JsError {
    match value {
        Some(Value::Error(err)) => err,
        other => panic!("expected an error payload, got {:?}", other),
    }
}

/// Test host races a task against a faster host timer, then awaits the task
#[test]
fn test_host_race_then_await_task() {
    let (host, runtime) = setup();
    let task = runtime.spawn_promise(|cx| async move {
        cx.sleep(100).await?;
        Ok(Value::Smi(42))
    });

    let fast = host_timer(&host, 50, Value::Smi(11));
    let slow = Promise::from_value(&host, task.to_value());
    let race = Promise::race(&host, &[slow, fast]);

    host.advance_by(50).unwrap();
    assert_eq!(race.result(), Some(Value::Smi(11)));
    assert_eq!(task.state(), PromiseState::Pending);

    let task_value = task.to_value();
    let follower = runtime.spawn_promise(move |cx| async move { cx.await_host(task_value).await });
    host.run_until_done().unwrap();

    assert_eq!(host.now(), 100);
    assert_eq!(follower.result(), Some(Value::Smi(42)));
}

/// Test a task races host values from inside the bridge
#[test]
fn test_task_side_race() {
    let (host, runtime) = setup();
    let fast = host_timer(&host, 5, Value::from("fast")).to_value();
    let slow = host_timer(&host, 500, Value::from("slow")).to_value();

    let task = runtime.spawn_promise(move |cx| async move { cx.race(vec![slow, fast]).await });
    host.run_until_done().unwrap();

    assert_eq!(task.result(), Some(Value::from("fast")));
}

/// Test cancelling a task suspended on a pending value rejects with stopped
#[test]
fn test_cancel_suspended_task() {
    let (host, runtime) = setup();
    let (never, _resolve, _reject) = runtime.make_promise();
    let task = runtime.spawn_promise(move |cx| async move { cx.await_value(never).await });

    host.run_until_done().unwrap();
    assert_eq!(task.state(), PromiseState::Pending);

    assert!(task.cancel());
    host.run_until_done().unwrap();

    let err = expect_error(task.result());
    assert_eq!(err.kind, ErrorKind::Stopped);
    assert_eq!(err.message, None);
    assert_eq!(runtime.pending_tasks(), 0);
    assert_eq!(runtime.pending_awaits(), 0);
}

/// Test cancel is idempotent and a no-op after completion
#[test]
fn test_cancel_idempotence() {
    let (host, runtime) = setup();
    let (never, _resolve, _reject) = runtime.make_promise();
    let pending = runtime.spawn_promise(move |cx| async move { cx.await_value(never).await });
    let done = runtime.spawn_promise(|_| async { Ok(Value::Smi(1)) });
    host.run_until_done().unwrap();

    assert!(pending.cancel());
    assert!(!pending.cancel());
    assert!(!done.cancel());
    host.run_until_done().unwrap();

    assert_eq!(done.result(), Some(Value::Smi(1)));
    assert_eq!(expect_error(pending.result()).kind, ErrorKind::Stopped);
}

/// Test native failures reach the host as (kind, message)
#[test]
fn test_native_error_round_trip() {
    let (host, runtime) = setup();
    let task = runtime.spawn_promise(|_| async { Err(TaskError::runtime("test error")) });
    host.run_until_done().unwrap();

    let err = expect_error(task.result());
    assert_eq!(err.kind, ErrorKind::RuntimeError);
    assert_eq!(err.message.as_deref(), Some("test error"));
}

/// Test a panicking task rejects instead of unwinding into the host
#[test]
fn test_panic_becomes_rejection() {
    let (host, runtime) = setup();
    let task = runtime.spawn_promise(|_| async {
        if true {
            panic!("test error");
        }
        Ok(Value::Undefined)
    });
    host.run_until_done().unwrap();

    let err = expect_error(task.result());
    assert_eq!(err.kind, ErrorKind::RuntimeError);
    assert_eq!(err.message.as_deref(), Some("test error"));
}

/// Test the active exception is captured while a handler runs
#[test]
fn test_exception_capture() {
    let (_host, runtime) = setup();
    let error = JsError::new(ErrorKind::RuntimeError, "test error");

    let handle = runtime.catching(error.clone(), || runtime.capture_active_exception());
    assert!(runtime.try_capture_active_exception().is_err());

    let captured = runtime.handles().take(handle).unwrap();
    assert_eq!(captured, Value::Error(error));
}

/// Test a rejected host value propagates through a task unchanged
#[test]
fn test_host_rejection_propagates() {
    let (host, runtime) = setup();
    let (handle, _resolve, reject) = runtime.make_promise();
    let task = runtime.spawn_promise(move |cx| async move { cx.await_value(handle).await });

    reject.reject(Value::from("nope"));
    host.run_until_done().unwrap();

    assert_eq!(task.state(), PromiseState::Rejected);
    assert_eq!(task.result(), Some(Value::from("nope")));
}

/// Test the host sees exactly one settlement per task
#[test]
fn test_exactly_once_settlement() {
    let (host, runtime) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let task = runtime.spawn_promise(|cx| async move {
        cx.sleep(10).await?;
        Ok(Value::Smi(7))
    });

    let (ok, err) = (seen.clone(), seen.clone());
    task.promise().subscribe(
        move |value| ok.borrow_mut().push(Ok(value)),
        move |reason| err.borrow_mut().push(Err(reason)),
    );

    host.run_until_done().unwrap();
    assert!(!task.cancel());
    host.run_until_done().unwrap();

    assert_eq!(*seen.borrow(), vec![Ok(Value::Smi(7))]);
}

/// Test cancelling a parent cancels the child it spawned
#[test]
fn test_child_cancelled_with_parent() {
    let (host, runtime) = setup();
    let child_slot = Rc::new(RefCell::new(None));
    let slot = child_slot.clone();
    let parent = runtime.spawn_promise(move |cx| async move {
        let child = cx.spawn(|cx| async move {
            cx.sleep(1_000).await?;
            Ok(Value::Smi(1))
        });
        *slot.borrow_mut() = Some(child.clone());
        cx.await_host(child.to_value()).await
    });

    host.advance_by(10).unwrap();
    parent.cancel();
    host.run_until_done().unwrap();

    let child = child_slot.borrow_mut().take().unwrap();
    assert_eq!(expect_error(child.result()).kind, ErrorKind::Stopped);
    assert_eq!(expect_error(parent.result()).kind, ErrorKind::Stopped);
    assert!(host.now() < 1_000);
}
