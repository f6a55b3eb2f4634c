//! Coroutine bridge demo CLI library
//!
//! Provides the scenario runner and argument parsing for `coro-demo`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod runner;

pub use cli::{Cli, Scenario};
pub use error::{CliError, CliResult};
pub use runner::{Observation, Report, ScenarioRunner};
