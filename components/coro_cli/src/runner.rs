//! Scenario runner
//!
//! Each scenario sets up host values and tasks on a fresh event loop, runs
//! the loop until it is idle and reports every settlement it observed along
//! with the virtual time at which it happened.

use crate::cli::Scenario;
use crate::error::CliResult;
use async_runtime::{EventLoop, Promise};
use coro_bridge::{Runtime, RuntimeConfig, TaskError};
use core_types::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One settlement seen by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Virtual time in milliseconds
    pub at_ms: u64,
    /// What settled
    pub label: String,
    /// `Ok` with the value, or `Err` with the rejection payload
    pub outcome: Result<Value, Value>,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>6}ms] {}: ", self.at_ms, self.label)?;
        match &self.outcome {
            Ok(value) => write!(f, "fulfilled {}", value),
            Err(Value::Error(err)) => write!(
                f,
                "rejected ({}, {})",
                err.kind,
                err.message.as_deref().unwrap_or("no message")
            ),
            Err(other) => write!(f, "rejected {}", other),
        }
    }
}

/// Everything a scenario observed, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Observations in the order they happened
    pub observations: Vec<Observation>,
    /// Virtual time when the loop went idle
    pub finished_at_ms: u64,
}

impl Report {
    /// The first observation with `label`.
    pub fn find(&self, label: &str) -> Option<&Observation> {
        self.observations.iter().find(|o| o.label == label)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for observation in &self.observations {
            writeln!(f, "{}", observation)?;
        }
        write!(f, "[{:>6}ms] idle", self.finished_at_ms)
    }
}

/// Runs scenarios against a fresh host and runtime.
#[derive(Debug)]
pub struct ScenarioRunner {
    host: EventLoop,
    runtime: Runtime,
    observations: Rc<RefCell<Vec<Observation>>>,
}

impl ScenarioRunner {
    /// Create a runner with the given runtime configuration
    ///
    /// # Example
    /// ```
    /// use coro_cli::{Scenario, ScenarioRunner};
    /// use coro_bridge::RuntimeConfig;
    ///
    /// let runner = ScenarioRunner::new(RuntimeConfig::default());
    /// let report = runner.run(&Scenario::Throw { message: "boom".into() }).unwrap();
    /// assert_eq!(report.observations.len(), 1);
    /// ```
    pub fn new(config: RuntimeConfig) -> Self {
        let host = EventLoop::new();
        let runtime = Runtime::with_config(&host, config);
        Self {
            host,
            runtime,
            observations: Rc::default(),
        }
    }

    /// Runs `scenario` to completion and returns what was observed.
    pub fn run(self, scenario: &Scenario) -> CliResult<Report> {
        tracing::debug!(?scenario, "running scenario");
        match scenario {
            Scenario::Race { task_ms, host_ms } => self.race(*task_ms, *host_ms)?,
            Scenario::Cancel { after_ms } => self.cancel(*after_ms)?,
            Scenario::Timeout { value_ms, limit_ms } => self.timeout(*value_ms, *limit_ms)?,
            Scenario::Throw { message } => self.throw(message)?,
        }
        self.runtime.shutdown();
        let observations = self.observations.borrow().clone();
        Ok(Report {
            observations,
            finished_at_ms: self.host.now(),
        })
    }

    fn observe(&self, label: &str, promise: &Promise) {
        let (ok_log, err_log) = (self.observations.clone(), self.observations.clone());
        let (ok_host, err_host) = (self.host.clone(), self.host.clone());
        let (ok_label, err_label) = (label.to_string(), label.to_string());
        promise.subscribe(
            move |value| {
                ok_log.borrow_mut().push(Observation {
                    at_ms: ok_host.now(),
                    label: ok_label,
                    outcome: Ok(value),
                })
            },
            move |reason| {
                err_log.borrow_mut().push(Observation {
                    at_ms: err_host.now(),
                    label: err_label,
                    outcome: Err(reason),
                })
            },
        );
    }

    fn resolve_after(&self, ms: u64, value: Value) -> Promise {
        let (promise, resolve, _) = Promise::with_resolvers(&self.host);
        self.host.set_timeout(ms, move || {
            resolve.resolve(value);
            Ok(())
        });
        promise
    }

    fn race(&self, task_ms: u64, host_ms: u64) -> CliResult<()> {
        let task = self.runtime.spawn_promise(move |cx| async move {
            cx.sleep(task_ms).await?;
            Ok(Value::Smi(42))
        });
        let fast = self.resolve_after(host_ms, Value::Smi(11));
        let slow = Promise::from_value(&self.host, task.to_value());
        self.observe("race", &Promise::race(&self.host, &[slow, fast]));
        self.host.run_until_done()?;

        let task_value = task.to_value();
        let follower = self
            .runtime
            .spawn_promise(move |cx| async move { cx.await_host(task_value).await });
        self.observe("task", follower.promise());
        self.host.run_until_done()?;
        Ok(())
    }

    fn cancel(&self, after_ms: u64) -> CliResult<()> {
        let (never, _resolve, _reject) = self.runtime.make_promise();
        let task = self
            .runtime
            .spawn_promise(move |cx| async move { cx.await_value(never).await });
        self.observe("task", task.promise());

        let target = task.clone();
        self.host.set_timeout(after_ms, move || {
            target.cancel();
            Ok(())
        });
        self.host.run_until_done()?;
        Ok(())
    }

    fn timeout(&self, value_ms: u64, limit_ms: u64) -> CliResult<()> {
        let value = self.resolve_after(value_ms, Value::from("value")).to_value();
        let task = self
            .runtime
            .spawn_promise(move |cx| async move { cx.timeout(value, limit_ms).await });
        self.observe("task", task.promise());
        self.host.run_until_done()?;
        Ok(())
    }

    fn throw(&self, message: &str) -> CliResult<()> {
        let message = message.to_string();
        let task = self
            .runtime
            .spawn_promise(move |_| async move { Err(TaskError::runtime(message)) });
        self.observe("task", task.promise());
        self.host.run_until_done()?;
        Ok(())
    }
}
