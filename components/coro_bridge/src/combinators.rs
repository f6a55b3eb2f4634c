//! Race, all and timeout over host values.

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::timer::{CancelOnDrop, CancellableTimer};
use core_types::{ErrorKind, Value};
use futures_util::future::{select, select_all, try_join_all, Either};
use std::rc::Rc;

impl TaskContext {
    /// Settles like the first of `values` to settle.
    ///
    /// The other awaits are abandoned, so their later settlements are
    /// dropped, and losing cancellable timers are cancelled. An empty input
    /// fails with a `RangeError`.
    pub async fn race(&self, values: Vec<Value>) -> Result<Value, TaskError> {
        if values.is_empty() {
            return Err(TaskError::Native {
                kind: ErrorKind::RangeError,
                message: "race needs at least one value".to_string(),
            });
        }
        let timers: Vec<Rc<CancellableTimer>> = values
            .iter()
            .filter_map(|value| value.as_object()?.downcast::<CancellableTimer>())
            .collect();
        let awaits: Vec<_> = values.into_iter().map(|value| self.await_host(value)).collect();

        let (outcome, winner, losers) = select_all(awaits).await;
        drop(losers);
        for timer in timers {
            timer.cancel();
        }
        tracing::trace!(winner, "race settled");
        outcome
    }

    /// Resolves with the values of all of `values`, in input order, once
    /// every one of them fulfilled.
    ///
    /// The first rejection fails the whole await: the remaining awaits are
    /// abandoned and pending cancellable timers among `values` are
    /// cancelled. An empty input resolves immediately with no values.
    pub async fn all(&self, values: Vec<Value>) -> Result<Vec<Value>, TaskError> {
        let timers: Vec<Rc<CancellableTimer>> = values
            .iter()
            .filter_map(|value| value.as_object()?.downcast::<CancellableTimer>())
            .collect();
        let awaits: Vec<_> = values.into_iter().map(|value| self.await_host(value)).collect();

        let outcome = try_join_all(awaits).await;
        if outcome.is_err() {
            for timer in timers {
                timer.cancel();
            }
        }
        tracing::trace!(ok = outcome.is_ok(), "all settled");
        outcome
    }

    /// Settles like `value`, or fails with a `TimeoutError` if it takes
    /// longer than `ms` milliseconds. The timer is cancelled when `value`
    /// wins.
    pub async fn timeout(&self, value: Value, ms: u64) -> Result<Value, TaskError> {
        let handle = self.runtime().start_timer(ms);
        let timer = self.runtime().timer_for(handle)?;
        let _cancel = CancelOnDrop(timer);

        match select(self.await_host(value), self.await_value(handle)).await {
            Either::Left((outcome, _expiry)) => outcome,
            Either::Right((expired, _pending)) => {
                expired?;
                Err(TaskError::Native {
                    kind: ErrorKind::TimeoutError,
                    message: format!("timed out after {}ms", ms),
                })
            }
        }
    }
}
