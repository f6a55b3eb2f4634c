//! Unit tests for CancellableTimer and sleep

use async_runtime::{EventLoop, PromiseState};
use coro_bridge::{AsyncState, CancellableTimer, Runtime, RuntimeConfig};
use core_types::{ObjectRef, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn sleep_resumes_at_virtual_time() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let woke_at = Rc::new(RefCell::new(None));
    let w = woke_at.clone();
    let task = runtime.spawn_promise(move |cx| async move {
        cx.sleep(75).await?;
        *w.borrow_mut() = Some(cx.runtime().host().now());
        Ok(Value::Undefined)
    });
    host.run_until_done().unwrap();
    assert_eq!(*woke_at.borrow(), Some(75));
    assert_eq!(task.state(), PromiseState::Fulfilled);
}

#[test]
fn cancelling_a_sleeping_task_cancels_its_timer() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let task = runtime.spawn_promise(|cx| async move {
        cx.sleep(1_000).await?;
        Ok(Value::Smi(1))
    });
    host.advance_by(10).unwrap();
    assert_eq!(host.pending_timers(), 1);

    task.cancel();
    host.run_until_done().unwrap();
    assert_eq!(host.pending_timers(), 0);
    assert_eq!(host.now(), 10);
    assert!(runtime.handles().is_empty());
}

#[test]
fn start_and_cancel_through_handles() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let handle = runtime.start_timer(40);
    let timer = runtime.timer_for(handle).unwrap();
    assert_eq!(timer.duration_ms(), 40);
    assert_eq!(timer.state(), AsyncState::Pending);

    assert_eq!(runtime.cancel_timer(handle), Ok(true));
    assert_eq!(runtime.cancel_timer(handle), Ok(false));
    host.run_until_done().unwrap();
    assert_eq!(timer.state(), AsyncState::Abandoned);
    assert_eq!(host.now(), 0);
    runtime.handles().release(handle).unwrap();
}

#[test]
fn timer_handle_can_be_awaited() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let handle = runtime.start_timer(15);
    let task = runtime.spawn_promise(move |cx| async move { cx.await_value(handle).await });
    host.run_until_done().unwrap();
    assert_eq!(task.result(), Some(Value::Undefined));
    assert_eq!(host.now(), 15);
}

#[test]
fn awaiting_a_cancelled_timer_needs_a_stop() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let timer = CancellableTimer::start(&host, 15);
    let value = Value::NativeObject(ObjectRef::from_rc(timer.clone()));
    let task = runtime.spawn_promise(move |cx| async move { cx.await_host(value).await });
    host.run_until_done().unwrap();

    assert!(timer.cancel());
    host.run_until_done().unwrap();
    assert_eq!(task.state(), PromiseState::Pending);

    task.cancel();
    host.run_until_done().unwrap();
    assert_eq!(task.state(), PromiseState::Rejected);
}

#[test]
fn many_sleepers_with_small_poll_budget() {
    let host = EventLoop::new();
    let config = RuntimeConfig::default().with_max_polls_per_turn(1);
    let runtime = Runtime::with_config(&host, config);
    let tasks: Vec<_> = (0..5)
        .map(|i| {
            runtime.spawn_promise(move |cx| async move {
                cx.sleep(10 * (5 - i as u64)).await?;
                Ok(Value::Smi(i))
            })
        })
        .collect();
    host.run_until_done().unwrap();
    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(task.result(), Some(Value::Smi(i as i32)));
    }
    assert_eq!(host.now(), 50);
}
