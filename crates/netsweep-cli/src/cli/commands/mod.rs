//! Command implementations.

pub mod bing;
pub mod config;
pub mod whois;

use netsweep_recon::TaskExecutor;
use std::path::PathBuf;

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output format
    pub output_format: OutputFormat,

    /// Worker pool size
    pub threads: usize,

    /// Verbose output
    pub verbose: bool,

    /// Config file given on the command line, if any
    pub config_path: Option<PathBuf>,

    /// Loaded configuration
    pub config: Config,
}

impl Context {
    /// Worker pool sized from flags or configuration.
    pub fn executor(&self) -> anyhow::Result<TaskExecutor> {
        Ok(TaskExecutor::new(self.threads)?)
    }
}
