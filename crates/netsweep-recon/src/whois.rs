//! WHOIS worker built on whois-rust.

use crate::error::{ReconError, ReconResult};
use netsweep_core::Target;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use whois_rust::{WhoIs, WhoIsLookupOptions};

/// Referrals followed before giving up on a thin registry answer
pub const DEFAULT_FOLLOW: u16 = 2;

/// Default per-lookup timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized WHOIS record
#[derive(Debug, Clone, Default, Serialize)]
pub struct WhoisInfo {
    /// Raw WHOIS response
    #[serde(skip)]
    pub raw: String,
    /// Registrar name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    /// Registrant information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant: Option<RegistrantInfo>,
    /// Creation date, as reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// Expiration date, as reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    /// Name servers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
    /// Status codes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
}

/// Registrant or network owner details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrantInfo {
    /// Organization name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Country code or name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Blocking WHOIS client.
///
/// Shared by reference across executor threads; every lookup opens its own
/// connection.
pub struct WhoisClient {
    whois: WhoIs,
    timeout: Duration,
    follow: u16,
}

impl WhoisClient {
    /// Create a client over the embedded server table
    pub fn new() -> ReconResult<Self> {
        let whois = WhoIs::from_string(include_str!("whois_servers.json"))
            .map_err(|e| ReconError::Whois(e.to_string()))?;
        Ok(Self {
            whois,
            timeout: DEFAULT_TIMEOUT,
            follow: DEFAULT_FOLLOW,
        })
    }

    /// Set the per-lookup timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many referrals to follow
    #[must_use]
    pub const fn follow(mut self, follow: u16) -> Self {
        self.follow = follow;
        self
    }

    /// Look up a classified target.
    ///
    /// Ranges are looked up by their network address.
    pub fn lookup(&self, target: &Target) -> ReconResult<WhoisInfo> {
        let query = match target {
            Target::Domain(name) => name.trim_end_matches('.').to_string(),
            Target::Ip(ip) => ip.to_string(),
            Target::Cidr(network) => network.network().to_string(),
        };
        self.lookup_raw(&query).map(|raw| parse_whois_response(&raw))
    }

    fn lookup_raw(&self, query: &str) -> ReconResult<String> {
        let mut options =
            WhoIsLookupOptions::from_string(query).map_err(|e| ReconError::Whois(e.to_string()))?;
        options.timeout = Some(self.timeout);
        options.follow = self.follow;

        debug!(query, "whois lookup");
        self.whois
            .lookup(options)
            .map_err(|e| ReconError::Whois(e.to_string()))
    }
}

/// Parse a raw WHOIS response into structured data.
///
/// Keys are matched case-insensitively; the first value wins for scalar
/// fields so a registry answer is not overwritten by a referral's footer.
#[must_use]
pub fn parse_whois_response(raw: &str) -> WhoisInfo {
    let mut info = WhoisInfo {
        raw: raw.to_string(),
        ..WhoisInfo::default()
    };
    let mut registrant = RegistrantInfo::default();

    for line in raw.lines() {
        let line = line.trim();
        if line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "registrar" => set_once(&mut info.registrar, value),
            "creation date" | "created" | "regdate" => set_once(&mut info.creation_date, value),
            "expiration date" | "expires" | "registry expiry date" | "paid-till" => {
                set_once(&mut info.expiration_date, value);
            }
            "name server" | "nserver" => {
                let server = value.to_lowercase();
                if !info.name_servers.contains(&server) {
                    info.name_servers.push(server);
                }
            }
            "status" | "domain status" => info.status.push(value.to_string()),
            "registrant organization" | "org-name" | "orgname" | "organization" => {
                set_once(&mut registrant.organization, value);
            }
            "registrant country" | "country" => set_once(&mut registrant.country, value),
            _ => {}
        }
    }

    if registrant != RegistrantInfo::default() {
        info.registrant = Some(registrant);
    }
    info
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}
