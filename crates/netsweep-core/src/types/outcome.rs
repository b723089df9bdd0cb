//! Per-item outcomes emitted by the resolver and the task executor.

use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use super::Target;
use crate::error::{ResolutionError, TaskError};

/// Port numbers attached to resolved addresses.
pub type PortSet = BTreeSet<u16>;

/// Result of resolving one concrete unit of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResolutionOutcome {
    /// An address ready to be handed to a worker
    Resolved {
        /// Address to operate on
        address: IpAddr,
        /// Target the address came from
        source: Target,
        /// Configured ports, informational only
        #[serde(skip_serializing_if = "Option::is_none")]
        ports: Option<Arc<PortSet>>,
    },
    /// The target could not be turned into an address
    Failed {
        /// Target that failed
        source: Target,
        /// Why it failed
        #[serde(serialize_with = "serialize_display")]
        error: ResolutionError,
    },
}

impl ResolutionOutcome {
    /// The target this outcome belongs to
    #[must_use]
    pub const fn source(&self) -> &Target {
        match self {
            Self::Resolved { source, .. } | Self::Failed { source, .. } => source,
        }
    }

    /// The resolved address, if any
    #[must_use]
    pub const fn address(&self) -> Option<IpAddr> {
        match self {
            Self::Resolved { address, .. } => Some(*address),
            Self::Failed { .. } => None,
        }
    }

    /// Returns true if resolution succeeded
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Association between an input item and what its worker produced.
#[derive(Debug)]
pub struct TaskOutcome<T, R, E> {
    /// The item exactly as it was pulled from the input
    pub input: T,
    /// What the worker returned, or how it failed
    pub result: Result<R, TaskError<E>>,
}

impl<T, R, E> TaskOutcome<T, R, E> {
    /// Returns true if the worker succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Splits the outcome into its parts
    pub fn into_parts(self) -> (T, Result<R, TaskError<E>>) {
        (self.input, self.result)
    }
}

fn serialize_display<S, D>(value: &D, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    D: std::fmt::Display,
{
    serializer.collect_str(value)
}
