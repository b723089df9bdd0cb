//! Type definitions shared by the resolver, the executor and the CLI.

mod config;
mod outcome;
mod parents;
mod target;

pub use config::*;
pub use outcome::*;
pub use parents::*;
pub use target::*;
