//! Phi⊗O contract probe: the `phio-contract` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            instrument,
            out,
            check_formula,
            target,
            zones,
            require,
            json,
        } => commands::probe::run(commands::probe::Args {
            instrument,
            out,
            check_formula,
            target,
            zones,
            require,
            json,
        }),

        Commands::Zones {
            instrument,
            config,
            zones,
            json,
        } => commands::zones::run(instrument, config, zones, json),

        Commands::Hash { path } => commands::hash::run(path),
    }
}
