//! Sentinel CLI -- compile, simulate, and inspect signal definitions
//! without standing up the server (§14, pure operator tooling).

mod commands;
mod simulator_setup;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// Sentinel CLI -- compile and simulate signal definitions.
#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a signal definition and print its AST.
    Compile(commands::compile::CompileArgs),
    /// Evaluate a signal at a single point in time.
    Simulate(commands::simulate::SimulateArgs),
    /// Evaluate a signal across a time range at a fixed step.
    Sweep(commands::sweep::SweepArgs),
    /// Binary-search the first conclusive trigger in a time range.
    FirstTrigger(commands::first_trigger::FirstTriggerArgs),
    /// Query the metric registry.
    Registry(commands::registry::RegistryArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Compile(args) => commands::compile::run(&args),
        Command::Simulate(args) => commands::simulate::run(&args).await,
        Command::Sweep(args) => commands::sweep::run(&args).await,
        Command::FirstTrigger(args) => commands::first_trigger::run(&args).await,
        Command::Registry(args) => commands::registry::run(&args),
    }
}
