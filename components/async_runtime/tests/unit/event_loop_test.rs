//! Unit tests for EventLoop

use async_runtime::{Driver, DriverStatus, EventLoop, MicroTask, Task};
use core_types::{ErrorKind, JsError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn new_event_loop_has_empty_task_queue() {
    let event_loop = EventLoop::new();
    assert!(event_loop.is_task_queue_empty());
}

#[test]
fn new_event_loop_has_empty_microtask_queue() {
    let event_loop = EventLoop::new();
    assert!(event_loop.is_microtask_queue_empty());
}

#[test]
fn enqueue_task_adds_to_task_queue() {
    let event_loop = EventLoop::new();
    event_loop.enqueue_task(Task::new(|| Ok(())));
    assert!(!event_loop.is_task_queue_empty());
}

#[test]
fn task_queue_fifo_order() {
    let event_loop = EventLoop::new();
    let results = Rc::new(RefCell::new(vec![]));

    for i in 1..=2 {
        let r = results.clone();
        event_loop.enqueue_task(Task::new(move || {
            r.borrow_mut().push(i);
            Ok(())
        }));
    }

    event_loop.run_all_tasks().unwrap();
    assert_eq!(*results.borrow(), vec![1, 2]);
}

#[test]
fn microtasks_enqueued_by_microtasks_drain_in_same_checkpoint() {
    let event_loop = EventLoop::new();
    let results = Rc::new(RefCell::new(vec![]));

    let r = results.clone();
    let host = event_loop.clone();
    event_loop.enqueue_microtask(MicroTask::new(move || {
        r.borrow_mut().push("outer");
        let r2 = r.clone();
        host.enqueue_microtask(MicroTask::new(move || {
            r2.borrow_mut().push("inner");
            Ok(())
        }));
        Ok(())
    }));

    event_loop.run_all_microtasks().unwrap();
    assert_eq!(*results.borrow(), vec!["outer", "inner"]);
}

#[test]
fn tasks_run_before_timers() {
    let event_loop = EventLoop::new();
    let order = Rc::new(RefCell::new(vec![]));

    let o = order.clone();
    event_loop.set_timeout(0, move || {
        o.borrow_mut().push("timer");
        Ok(())
    });
    let o = order.clone();
    event_loop.enqueue_task(Task::new(move || {
        o.borrow_mut().push("task");
        Ok(())
    }));

    event_loop.run_until_done().unwrap();
    assert_eq!(*order.borrow(), vec!["task", "timer"]);
}

#[test]
fn equal_delays_fire_in_scheduling_order() {
    let event_loop = EventLoop::new();
    let order = Rc::new(RefCell::new(vec![]));
    for name in ["a", "b", "c"] {
        let o = order.clone();
        event_loop.set_timeout(10, move || {
            o.borrow_mut().push(name);
            Ok(())
        });
    }
    event_loop.run_until_done().unwrap();
    assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn timer_scheduled_from_timer_uses_current_clock() {
    let event_loop = EventLoop::new();
    let fired_at = Rc::new(Cell::new(0));

    let host = event_loop.clone();
    let f = fired_at.clone();
    event_loop.set_timeout(10, move || {
        let inner_host = host.clone();
        host.set_timeout(5, move || {
            f.set(inner_host.now());
            Ok(())
        });
        Ok(())
    });

    event_loop.run_until_done().unwrap();
    assert_eq!(fired_at.get(), 15);
}

#[test]
fn process_one_cycle_reports_idle() {
    let event_loop = EventLoop::new();
    assert!(!event_loop.process_one_cycle().unwrap());
    event_loop.enqueue_task(Task::new(|| Ok(())));
    assert!(event_loop.process_one_cycle().unwrap());
    assert!(!event_loop.process_one_cycle().unwrap());
}

#[test]
fn task_error_propagates() {
    let event_loop = EventLoop::new();
    event_loop.enqueue_task(Task::new(|| Err(JsError::new(ErrorKind::TypeError, "boom"))));
    let err = event_loop.run_until_done().unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

struct QueueDriver {
    pending: Cell<u32>,
    host: EventLoop,
    log: Rc<RefCell<Vec<String>>>,
}

impl Driver for QueueDriver {
    fn has_work(&self) -> bool {
        self.pending.get() > 0
    }

    fn run_ready(&self) -> DriverStatus {
        self.pending.set(self.pending.get() - 1);
        self.log.borrow_mut().push(format!("driver@{}", self.host.now()));
        DriverStatus::Idle
    }
}

#[test]
fn driver_runs_after_microtasks_of_the_same_turn() {
    let event_loop = EventLoop::new();
    let log = Rc::new(RefCell::new(vec![]));
    let driver = Rc::new(QueueDriver {
        pending: Cell::new(0),
        host: event_loop.clone(),
        log: log.clone(),
    });
    event_loop.register_driver(driver.clone());

    let d = driver.clone();
    let l = log.clone();
    let host = event_loop.clone();
    event_loop.set_timeout(20, move || {
        l.borrow_mut().push("timer".to_string());
        let l2 = l.clone();
        let d2 = d.clone();
        host.enqueue_microtask(MicroTask::new(move || {
            l2.borrow_mut().push("microtask".to_string());
            d2.pending.set(1);
            Ok(())
        }));
        Ok(())
    });

    event_loop.run_until_done().unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["timer".to_string(), "microtask".to_string(), "driver@20".to_string()]
    );
}
