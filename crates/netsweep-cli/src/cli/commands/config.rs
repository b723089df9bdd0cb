//! `netsweep config` - CLI configuration inspection.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::OutputFormat;

pub fn execute(ctx: &Context, args: &ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(ctx),
        ConfigCommands::Path => show_path(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    match ctx.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Pretty => {
            let path = Config::resolve_path(ctx.config_path.as_deref())?;
            let origin = if path.exists() {
                path.display().to_string()
            } else {
                format!("{} (not found, using defaults)", path.display())
            };

            println!("{} {}", "Configuration:".bold(), origin.dimmed());
            println!();
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn show_path(ctx: &Context) -> Result<()> {
    let path = Config::resolve_path(ctx.config_path.as_deref())?;
    println!("{}", path.display());
    Ok(())
}
