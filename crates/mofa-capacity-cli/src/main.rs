//! MoFA capacity CLI - inspect architectures and resolve memory plans

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};

pub use error::CliError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output on stdout stays parseable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List { json } => commands::list::run(json)?,
        Commands::Resolve(args) => commands::resolve::run(&args)?,
    }

    Ok(())
}
