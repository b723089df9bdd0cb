//! Bounded-concurrency execution, target resolution and recon workers.
//!
//! - [`executor`]: fixed-size thread pool mapping a blocking worker over a
//!   lazy input, streaming outcomes back as they complete
//! - [`dns`]: CIDR expansion and domain resolution with nameserver rotation
//! - `whois` (feature `whois`): WHOIS lookups and response normalization
//! - `bing` (feature `bing`): Bing `ip:` search scraping
//!
//! # Example
//!
//! ```rust,no_run
//! use netsweep_core::{ResolverConfig, Target};
//! use netsweep_recon::{expand, Resolver, TaskExecutor, Unit};
//!
//! let resolver = Resolver::new(&ResolverConfig::default())?;
//! let units = expand(vec![
//!     Target::classify("192.0.2.0/30"),
//!     Target::classify("example.com"),
//! ])?;
//!
//! let executor = TaskExecutor::new(4)?;
//! let settle = move |unit: &Unit| resolver.settle(unit).address().ok_or("unresolved");
//! for outcome in executor.run(units, settle)? {
//!     println!("{:?}", outcome.result);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![doc(html_root_url = "https://docs.rs/netsweep-recon/0.3.0")]

mod error;

pub mod dns;
pub mod executor;

#[cfg(feature = "whois")]
pub mod whois;

#[cfg(feature = "bing")]
pub mod bing;

pub use dns::{expand, Resolution, Resolver, Unit, Units, Upstream};
pub use error::{ReconError, ReconResult};
pub use executor::{ExecutorState, Outcomes, TaskExecutor, DEFAULT_THREADS};
