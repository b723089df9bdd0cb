//! Core types and errors shared across netsweep.
//!
//! This crate provides the foundational pieces used by the recon tools:
//!
//! - **Targets**: classification of raw input tokens into [`Target`]s
//! - **Outcomes**: per-item results for resolution ([`ResolutionOutcome`]) and
//!   task execution ([`TaskOutcome`])
//! - **Configuration**: the [`ResolverConfig`] value handed to the resolver
//! - **Errors**: the per-item and fatal error taxonomy
//!
//! # Example
//!
//! ```rust
//! use netsweep_core::Target;
//!
//! let target = Target::classify("10.0.0.0/30");
//! assert!(target.is_cidr());
//! assert_eq!(target.to_string(), "10.0.0.0/30");
//! ```

#![doc(html_root_url = "https://docs.rs/netsweep-core/0.3.0")]

mod error;
pub mod types;

pub use error::{ConfigError, Error, ResolutionError, Result, TaskError};
pub use types::*;
