//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// WHOIS and Bing IP search over domains, addresses and CIDR ranges
///
/// Targets may be given as arguments, comma-separated lists, or read from a
/// file (one or more per line, `#` comments allowed).
#[derive(Parser, Debug)]
#[command(name = "netsweep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Worker threads
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "NETSWEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// WHOIS lookups for domains, IPs and name permutations
    Whois(WhoisArgs),

    /// Find pages Bing indexed for each resolved address
    Bing(BingArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Shared target input
// ============================================================================

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Domains, IP addresses or CIDR ranges
    pub targets: Vec<String>,

    /// Read targets from a file (`-` for stdin)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

// ============================================================================
// WHOIS command
// ============================================================================

#[derive(Args, Debug)]
pub struct WhoisArgs {
    #[command(flatten)]
    pub input: TargetArgs,

    /// Append to each name before its TLD (repeatable, comma-separated)
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    pub suffix: Vec<String>,

    /// Try these TLDs instead of each name's own (repeatable, comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tld: Vec<String>,

    /// Per-lookup timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Referrals to follow
    #[arg(long)]
    pub follow: Option<u16>,

    /// Print the raw WHOIS response
    #[arg(long)]
    pub raw: bool,
}

// ============================================================================
// Bing command
// ============================================================================

#[derive(Args, Debug)]
pub struct BingArgs {
    #[command(flatten)]
    pub input: TargetArgs,

    /// Nameserver to resolve domains with (repeatable, comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub nameserver: Vec<String>,

    /// Query nameservers over TCP
    #[arg(long)]
    pub tcp: bool,

    /// Also use the system resolvers when nameservers are given
    #[arg(long)]
    pub system_resolvers: bool,

    /// Ports to attach to each address (e.g. 80,443,8000-8010)
    #[arg(short, long)]
    pub ports: Option<String>,

    /// DNS timeout in seconds (fractions allowed)
    #[arg(long)]
    pub dns_timeout: Option<f64>,

    /// HTTP(S) or SOCKS proxy URL
    #[arg(long)]
    pub proxy: Option<String>,

    /// User-Agent header for search requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Result pages to fetch per address
    #[arg(long)]
    pub pages: Option<usize>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show config file path
    Path,
}
