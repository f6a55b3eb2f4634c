//! Resource lifecycle across the bridge
//!
//! Verifies handles, awaits and timers are released once tasks finish,
//! are cancelled, or the runtime is torn down.

use async_runtime::{EventLoop, PromiseState};
use coro_bridge::{AsyncState, Runtime, RuntimeConfig};
use core_types::Value;

/// Test a completed task leaves no handles behind
#[test]
fn test_completed_task_releases_handles() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let task = runtime.spawn_promise(|cx| async move {
        cx.sleep(20).await?;
        cx.await_host(Value::from("done")).await
    });

    host.run_until_done().unwrap();

    assert_eq!(task.result(), Some(Value::from("done")));
    assert_eq!(runtime.pending_tasks(), 0);
    assert_eq!(runtime.pending_awaits(), 0);
    assert!(runtime.handles().is_empty());
}

/// Test cancelling a sleeping task cancels its timer
#[test]
fn test_cancel_cancels_timer() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let task = runtime.spawn_promise(|cx| async move {
        cx.sleep(1_000).await?;
        Ok(Value::Undefined)
    });

    host.advance_by(1).unwrap();
    assert_eq!(host.pending_timers(), 1);

    task.cancel();
    host.run_until_done().unwrap();

    assert_eq!(task.state(), PromiseState::Rejected);
    assert_eq!(host.pending_timers(), 0);
    assert_eq!(host.now(), 1);
}

/// Test a cancelled timer never settles its promise
#[test]
fn test_cancelled_timer_stays_pending() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let handle = runtime.start_timer(30);
    let timer = runtime.timer_for(handle).unwrap();

    assert!(runtime.cancel_timer(handle).unwrap());
    assert!(!runtime.cancel_timer(handle).unwrap());
    host.run_until_done().unwrap();

    assert_eq!(timer.state(), AsyncState::Abandoned);
    assert_eq!(timer.promise().state(), PromiseState::Pending);
    runtime.handles().release(handle).unwrap();
}

/// Test shutdown drops suspended tasks without settling them
#[test]
fn test_shutdown_tears_down_tasks() {
    let host = EventLoop::new();
    let runtime = Runtime::new(&host);
    let (never, _resolve, _reject) = runtime.make_promise();
    let task = runtime.spawn_promise(move |cx| async move { cx.await_value(never).await });
    host.run_until_done().unwrap();
    assert_eq!(runtime.pending_tasks(), 1);
    assert_eq!(runtime.pending_awaits(), 1);

    runtime.shutdown();
    host.run_until_done().unwrap();

    assert_eq!(runtime.pending_tasks(), 0);
    assert_eq!(runtime.pending_awaits(), 0);
    assert_eq!(task.state(), PromiseState::Pending);
}

/// Test a small poll budget still completes many tasks
#[test]
fn test_poll_budget_completes_all_tasks() {
    let host = EventLoop::new();
    let runtime = Runtime::with_config(&host, RuntimeConfig::default().with_max_polls_per_turn(1));
    let tasks: Vec<_> = (0..10)
        .map(|i| runtime.spawn_promise(move |_| async move { Ok(Value::Smi(i)) }))
        .collect();

    host.run_until_done().unwrap();

    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(task.result(), Some(Value::Smi(i as i32)));
    }
}
