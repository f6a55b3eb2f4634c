//! Command-line arguments

use crate::error::CliResult;
use clap::{Parser, Subcommand};
use coro_bridge::RuntimeConfig;
use std::path::PathBuf;

/// Runs canonical coroutine bridge scenarios on a virtual-time event loop.
#[derive(Debug, Parser)]
#[command(name = "coro-demo", version, about)]
pub struct Cli {
    /// Log bridge internals at debug level (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// JSON file with runtime configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Task polls per host turn (overrides the config file)
    #[arg(long)]
    pub max_polls_per_turn: Option<usize>,

    /// Scenario to run
    #[command(subcommand)]
    pub scenario: Scenario,
}

/// The scenarios `coro-demo` knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Scenario {
    /// Race a sleeping task against a host timer, then await the task
    Race {
        /// How long the task sleeps before returning 42
        #[arg(long, default_value_t = 100)]
        task_ms: u64,
        /// When the host timer yields 11
        #[arg(long, default_value_t = 50)]
        host_ms: u64,
    },
    /// Cancel a task suspended on a value that never settles
    Cancel {
        /// When the host cancels the task
        #[arg(long, default_value_t = 10)]
        after_ms: u64,
    },
    /// Await a host value under a time limit
    Timeout {
        /// When the awaited value settles
        #[arg(long, default_value_t = 100)]
        value_ms: u64,
        /// Time limit for the await
        #[arg(long, default_value_t = 30)]
        limit_ms: u64,
    },
    /// Fail a task with a native error
    Throw {
        /// Error message
        #[arg(long, default_value = "test error")]
        message: String,
    },
}

impl Cli {
    /// Builds the runtime configuration from `--config` and flag overrides.
    pub fn runtime_config(&self) -> CliResult<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => RuntimeConfig::default(),
        };
        if let Some(polls) = self.max_polls_per_turn {
            config = config.with_max_polls_per_turn(polls);
        }
        Ok(config)
    }
}
