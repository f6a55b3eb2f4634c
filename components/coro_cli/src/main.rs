//! Coroutine bridge demo CLI
//!
//! Entry point for `coro-demo`. Parses CLI arguments, sets up logging and
//! delegates to the ScenarioRunner.

use clap::Parser as ClapParser;
use coro_cli::{Cli, CliResult, ScenarioRunner};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn run(cli: &Cli) -> CliResult<()> {
    let config = cli.runtime_config()?;
    let report = ScenarioRunner::new(config).run(&cli.scenario)?;
    println!("{}", report);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
