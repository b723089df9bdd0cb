//! Resolver configuration types.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use super::PortSet;
use crate::error::ConfigError;

/// Standard DNS port
pub const DNS_PORT: u16 = 53;

/// Transport used for DNS queries to explicit nameservers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Plain UDP
    #[default]
    Udp,
    /// TCP, for networks that drop or truncate UDP
    Tcp,
}

/// How domain targets are resolved and what metadata is attached.
///
/// Built once per run and handed to the resolver by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Explicit nameservers, queried in round-robin order
    pub nameservers: Vec<SocketAddr>,

    /// Also use the nameservers from the system configuration
    pub use_system_resolvers: bool,

    /// Transport for explicit nameservers
    pub transport: Transport,

    /// Ports attached to every resolved address
    pub ports: Option<PortSet>,

    /// Per-attempt lookup timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Attempts per lookup before giving up
    pub attempts: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            use_system_resolvers: true,
            transport: Transport::Udp,
            ports: None,
            timeout: Duration::from_secs(5),
            attempts: 2,
        }
    }
}

impl ResolverConfig {
    /// Create a configuration using only the system resolvers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an explicit nameserver
    #[must_use]
    pub fn nameserver(mut self, addr: SocketAddr) -> Self {
        self.nameservers.push(addr);
        self
    }

    /// Toggle use of the system resolvers
    #[must_use]
    pub const fn use_system_resolvers(mut self, enabled: bool) -> Self {
        self.use_system_resolvers = enabled;
        self
    }

    /// Set the transport for explicit nameservers
    #[must_use]
    pub const fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Attach ports to resolved addresses
    #[must_use]
    pub fn ports(mut self, ports: PortSet) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Set the per-attempt lookup timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts per lookup
    #[must_use]
    pub const fn attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Fails if there is nothing to send queries to.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nameservers.is_empty() && !self.use_system_resolvers {
            return Err(ConfigError::NoNameservers);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Parses a nameserver given as `ip`, `ip:port` or `[v6]:port`.
pub fn parse_nameserver(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::InvalidNameserver(s.to_string()))
}

/// Durations as fractional seconds, so `1.5` survives a round trip.
mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid duration {secs}: {e}")))
    }
}
