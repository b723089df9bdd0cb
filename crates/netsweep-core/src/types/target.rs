//! Classification of raw input tokens.
//!
//! A token is one of:
//! * A CIDR block (e.g., `192.168.1.0/24`, `2001:db8::/126`).
//! * A single IPv4/IPv6 address.
//! * Anything else, treated as a domain name.

use ipnetwork::IpNetwork;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

/// Maximum length of a domain name in presentation format.
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// A classified input unit awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A name to be resolved through DNS.
    Domain(String),
    /// A literal address, passed through untouched.
    Ip(IpAddr),
    /// A network range, expanded to every member address.
    Cidr(IpNetwork),
}

impl Target {
    /// Classifies a raw token.
    ///
    /// Never fails: anything that is neither a valid CIDR range nor an IP
    /// literal is a domain. Whitespace around the token is ignored.
    #[must_use]
    pub fn classify(token: &str) -> Self {
        let token = token.trim();

        if token.contains('/') {
            if let Ok(network) = token.parse::<IpNetwork>() {
                return Self::Cidr(network);
            }
            return Self::Domain(token.to_string());
        }

        token
            .parse::<IpAddr>()
            .map_or_else(|_| Self::Domain(token.to_string()), Self::Ip)
    }

    /// Returns true for CIDR ranges
    #[must_use]
    pub const fn is_cidr(&self) -> bool {
        matches!(self, Self::Cidr(_))
    }

    /// Returns true for domain names
    #[must_use]
    pub const fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    /// Returns true for bare IP addresses
    #[must_use]
    pub const fn is_ip(&self) -> bool {
        matches!(self, Self::Ip(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(name) => f.write_str(name),
            Self::Ip(addr) => write!(f, "{addr}"),
            Self::Cidr(network) => write!(f, "{network}"),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Checks that a name is usable as a DNS query name.
///
/// Accepts letters, digits, `-` and `_` in labels (underscores show up in
/// service names), an optional trailing dot, at most 63 octets per label and
/// 253 overall. Empty labels are rejected.
#[must_use]
pub fn is_valid_domain(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
        return false;
    }

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    })
}
