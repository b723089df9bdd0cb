//! Configuration management.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use netsweep_core::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// CLI configuration.
///
/// Every field is optional; flags given on the command line win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format.
    pub output_format: Option<OutputFormat>,

    /// Worker threads per run.
    pub threads: Option<usize>,

    /// Resolver defaults for commands that resolve targets.
    pub resolver: ResolverConfig,

    /// Bing search defaults.
    pub bing: BingSettings,

    /// WHOIS defaults.
    pub whois: WhoisSettings,
}

/// `[bing]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BingSettings {
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub pages: Option<usize>,
    /// Seconds
    pub timeout: Option<u64>,
}

/// `[whois]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhoisSettings {
    /// Seconds
    pub timeout: Option<u64>,
    pub follow: Option<u16>,
}

impl Config {
    /// Get the default config file path.
    pub fn path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("io", "netsweep", "netsweep")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Resolve an explicit path or fall back to the default one.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        explicit.map_or_else(Self::path, |p| Ok(p.to_path_buf()))
    }

    /// Load configuration; a missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
