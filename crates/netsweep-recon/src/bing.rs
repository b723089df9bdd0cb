//! Bing `ip:` search worker.
//!
//! Finds pages Bing has indexed for a given address by querying
//! `ip:<address>` and scraping the organic result blocks.

use crate::error::{ReconError, ReconResult};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Bing search endpoint
pub const DEFAULT_BASE_URL: &str = "https://www.bing.com/search";

/// Results Bing returns per page
const PAGE_SIZE: usize = 10;

/// Browser-like user agent; Bing serves a stripped page to unknown clients
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

static RESULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<li class="b_algo".*?<h2[^>]*>\s*<a [^>]*?href="([^"]+)"[^>]*>(.*?)</a>"#)
        .unwrap_or_else(|e| panic!("invalid result pattern: {e}"))
});

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").unwrap_or_else(|e| panic!("invalid tag pattern: {e}")));

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchHit {
    /// Result URL
    pub url: String,
    /// Result title with markup removed
    pub title: String,
}

/// Bing worker settings
#[derive(Debug, Clone)]
pub struct BingConfig {
    /// Search endpoint
    pub base_url: String,
    /// User-Agent header
    pub user_agent: String,
    /// Optional HTTP(S) or SOCKS proxy URL
    pub proxy: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum result pages per address
    pub pages: usize,
}

impl Default for BingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            timeout: Duration::from_secs(15),
            pages: 3,
        }
    }
}

/// Blocking Bing client, shared by reference across executor threads
pub struct BingSearch {
    http: Client,
    base_url: Url,
    pages: usize,
}

impl BingSearch {
    /// Build a client from settings
    pub fn new(config: &BingConfig) -> ReconResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ReconError::Config(format!("base url {}: {e}", config.base_url)))?;

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .gzip(true);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ReconError::Config(format!("proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| ReconError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            pages: config.pages.max(1),
        })
    }

    /// URL of result page `page` (zero-based) for `address`
    #[must_use]
    pub fn page_url(&self, address: IpAddr, page: usize) -> Url {
        let first = (page * PAGE_SIZE + 1).to_string();
        let query = format!("ip:{address}");

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("first", &first);
        url
    }

    /// Collect hits for `address` across up to the configured number of pages.
    ///
    /// Stops early once a page adds nothing new; Bing repeats its last page
    /// when asked for one past the end.
    pub fn search(&self, address: IpAddr) -> ReconResult<Vec<SearchHit>> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        for page in 0..self.pages {
            let body = self.fetch(&self.page_url(address, page))?;
            let mut added = 0;

            for hit in parse_results(&body) {
                if seen.insert(hit.url.clone()) {
                    hits.push(hit);
                    added += 1;
                }
            }

            debug!(%address, page, added, "bing page parsed");
            if added == 0 {
                break;
            }
        }

        Ok(hits)
    }

    fn fetch(&self, url: &Url) -> ReconResult<String> {
        let response = self
            .http
            .get(url.as_str())
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ReconError::Timeout
                } else {
                    ReconError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            warn!(%status, "bing refused the request");
            return Err(ReconError::Blocked(status.to_string()));
        }
        if !status.is_success() {
            return Err(ReconError::Http(format!("unexpected status {status}")));
        }

        let body = response
            .text()
            .map_err(|e| ReconError::Http(e.to_string()))?;

        if body.contains("/challenge/verify") || body.contains("b_captcha") {
            return Err(ReconError::Blocked(String::from("captcha")));
        }
        Ok(body)
    }
}

/// Extract organic results from a Bing result page
#[must_use]
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    RESULT_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let url = decode_entities(&caps[1]);
            if !url.starts_with("http") {
                return None;
            }
            let title = decode_entities(TAG_RE.replace_all(&caps[2], "").trim());
            Some(SearchHit { url, title })
        })
        .collect()
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
