//! # netsweep-cli
//!
//! Command-line front end for the netsweep recon workers.
//!
//! ## Features
//!
//! - **WHOIS**: bulk lookups over domains, IPs and name permutations
//! - **Bing IP search**: resolve targets, then find pages indexed per address
//! - **Flexible input**: positional arguments, comma lists, files or stdin
//! - **Output formats**: colored text or JSON lines

pub mod cli;
pub mod config;
pub mod input;
pub mod logging;
pub mod output;

pub use cli::run;
