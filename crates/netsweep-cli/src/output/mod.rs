//! Output formatting for different formats.

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored human-readable text
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: pretty, json",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Write `value` as a single JSON line on stdout.
pub fn json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Marker line for a successful item
pub fn ok_header(subject: &str, detail: &str) {
    if detail.is_empty() {
        println!("{} {}", "[+]".green().bold(), subject.cyan().bold());
    } else {
        println!(
            "{} {} {}",
            "[+]".green().bold(),
            subject.cyan().bold(),
            detail.dimmed()
        );
    }
}

/// Marker line for a failed item
pub fn failure(subject: &str, error: &dyn std::fmt::Display) {
    println!("{} {} {}", "[-]".red().bold(), subject.bold(), error.to_string().red());
}

/// Indented `key: value` line
pub fn field(key: &str, value: &str) {
    println!("    {} {}", format!("{key}:").bold(), value);
}
