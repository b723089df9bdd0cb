//! Reverse mapping from resolved addresses to the names that produced them.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

use super::{ResolutionOutcome, Target};

/// Address to source-name index built by callers around resolver output.
///
/// Only records links that carry information: bare IPs map to themselves and
/// CIDR members all share the range, so neither is recorded.
#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    parents: HashMap<IpAddr, BTreeSet<String>>,
}

impl ParentIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome if it links an address to a different source.
    ///
    /// Returns true when a new parent was added.
    pub fn observe(&mut self, outcome: &ResolutionOutcome) -> bool {
        let ResolutionOutcome::Resolved {
            address, source, ..
        } = outcome
        else {
            return false;
        };

        match source {
            Target::Cidr(_) => false,
            Target::Ip(ip) if ip == address => false,
            _ => self
                .parents
                .entry(*address)
                .or_default()
                .insert(source.to_string()),
        }
    }

    /// Source names that resolved to `address`
    #[must_use]
    pub fn parents_of(&self, address: &IpAddr) -> Option<&BTreeSet<String>> {
        self.parents.get(address)
    }

    /// Number of addresses with at least one parent
    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns true if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(address: &str, source: &str) -> ResolutionOutcome {
        ResolutionOutcome::Resolved {
            address: address.parse().unwrap(),
            source: Target::classify(source),
            ports: None,
        }
    }

    #[test]
    fn records_domains_only() {
        let mut index = ParentIndex::new();

        assert!(index.observe(&resolved("1.2.3.4", "a.example")));
        assert!(index.observe(&resolved("1.2.3.4", "b.example")));
        assert!(!index.observe(&resolved("1.2.3.4", "a.example")));
        assert!(!index.observe(&resolved("1.2.3.4", "1.2.3.4")));
        assert!(!index.observe(&resolved("10.0.0.1", "10.0.0.0/30")));

        assert_eq!(index.len(), 1);
        let parents = index.parents_of(&"1.2.3.4".parse().unwrap()).unwrap();
        assert_eq!(
            parents.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a.example", "b.example"]
        );
        assert!(index.parents_of(&"10.0.0.1".parse().unwrap()).is_none());
    }

    #[test]
    fn ignores_failures() {
        let mut index = ParentIndex::new();
        let failed = ResolutionOutcome::Failed {
            source: Target::classify("missing.example"),
            error: crate::ResolutionError::NotFound("missing.example".into()),
        };
        assert!(!index.observe(&failed));
        assert!(index.is_empty());
    }
}
