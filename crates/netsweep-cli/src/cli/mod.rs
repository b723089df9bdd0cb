//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use netsweep_recon::DEFAULT_THREADS;

use crate::config::Config;
use crate::logging;

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;

    let ctx = commands::Context {
        output_format: cli
            .output
            .or(config.output_format)
            .unwrap_or_default(),
        threads: cli.threads.or(config.threads).unwrap_or(DEFAULT_THREADS),
        verbose: cli.verbose,
        config_path: cli.config,
        config,
    };

    match cli.command {
        Commands::Whois(args) => commands::whois::execute(&ctx, args),
        Commands::Bing(args) => commands::bing::execute(&ctx, args),
        Commands::Config(args) => commands::config::execute(&ctx, &args),
    }
}
