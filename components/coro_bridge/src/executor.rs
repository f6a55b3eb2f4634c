//! Serial executor.
//!
//! Runs `'static` local futures on the host thread. The host event loop
//! drives it through the [`Driver`] trait: every time the loop reaches a
//! microtask checkpoint the executor first applies resumptions posted by the
//! host, then polls woken tasks until either nothing is ready or the per-turn
//! poll budget is spent.

use crate::awaiter::{release_quietly, AwaiterRegistry, Resumption};
use crate::handle::HandleBridge;
use async_runtime::{Driver, DriverStatus};
use crossbeam::channel::{Receiver, TryRecvError};
use futures_util::task::{waker, ArcWake};
use parking_lot::Mutex;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Identifier of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

type LocalTask = Pin<Box<dyn Future<Output = ()>>>;
type ReadyQueue = Arc<Mutex<VecDeque<TaskId>>>;

struct TaskWaker {
    id: TaskId,
    ready: ReadyQueue,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let mut ready = arc_self.ready.lock();
        if !ready.contains(&arc_self.id) {
            ready.push_back(arc_self.id);
        }
    }
}

/// Single-threaded executor driven by the host event loop.
pub struct Executor {
    tasks: RefCell<HashMap<TaskId, LocalTask>>,
    next_id: Cell<u64>,
    ready: ReadyQueue,
    inbox: Receiver<Resumption>,
    awaiters: Rc<AwaiterRegistry>,
    handles: HandleBridge,
    max_polls_per_turn: usize,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("tasks", &self.tasks.borrow().len())
            .field("ready", &self.ready.lock().len())
            .field("inbox", &self.inbox.len())
            .field("max_polls_per_turn", &self.max_polls_per_turn)
            .finish()
    }
}

impl Executor {
    pub(crate) fn new(
        inbox: Receiver<Resumption>,
        awaiters: Rc<AwaiterRegistry>,
        handles: HandleBridge,
        max_polls_per_turn: usize,
    ) -> Self {
        Self {
            tasks: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            ready: Arc::new(Mutex::new(VecDeque::new())),
            inbox,
            awaiters,
            handles,
            max_polls_per_turn: max_polls_per_turn.max(1),
        }
    }

    /// Queues `future` to be polled on the next turn.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let id = TaskId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.tasks.borrow_mut().insert(id, Box::pin(future));
        self.ready.lock().push_back(id);
        tracing::trace!(%id, "task spawned");
        id
    }

    /// Number of tasks that have not completed.
    pub fn task_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Drops every task frame and every undelivered resumption.
    pub fn clear(&self) {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        self.ready.lock().clear();
        tracing::debug!(tasks = tasks.len(), "dropping task frames");
        // Frames run their destructors outside the borrow; they reach back
        // into the runtime to abandon their subscriptions.
        drop(tasks);
        self.drain_inbox();
    }

    pub(crate) fn drain_inbox(&self) {
        loop {
            match self.inbox.try_recv() {
                Ok(resumption) => {
                    if let Some(stale) = self.awaiters.deliver(resumption) {
                        tracing::debug!(token = %resumption.token, "discarding late resumption");
                        release_quietly(&self.handles, stale.handle());
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    fn poll_task(&self, id: TaskId) {
        let task = self.tasks.borrow_mut().remove(&id);
        let Some(mut task) = task else {
            return;
        };
        let waker = waker(Arc::new(TaskWaker {
            id,
            ready: Arc::clone(&self.ready),
        }));
        let mut cx = Context::from_waker(&waker);
        match task.as_mut().poll(&mut cx) {
            Poll::Ready(()) => tracing::trace!(%id, "task completed"),
            Poll::Pending => {
                self.tasks.borrow_mut().insert(id, task);
            }
        }
    }
}

impl Driver for Executor {
    fn has_work(&self) -> bool {
        !self.ready.lock().is_empty() || !self.inbox.is_empty()
    }

    fn run_ready(&self) -> DriverStatus {
        self.drain_inbox();
        let mut polls = 0;
        while polls < self.max_polls_per_turn {
            let next = self.ready.lock().pop_front();
            let Some(id) = next else {
                return DriverStatus::Idle;
            };
            self.poll_task(id);
            polls += 1;
        }
        if self.has_work() {
            tracing::trace!(polls, "poll budget spent, yielding to host");
            DriverStatus::Yielded
        } else {
            DriverStatus::Idle
        }
    }
}
