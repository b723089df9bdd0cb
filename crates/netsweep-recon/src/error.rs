use thiserror::Error;

/// Result type alias for reconnaissance workers
pub type ReconResult<T> = std::result::Result<T, ReconError>;

/// Errors from reconnaissance workers
#[derive(Error, Debug)]
pub enum ReconError {
    /// WHOIS lookup error
    #[error("WHOIS error: {0}")]
    Whois(String),

    /// HTTP request or response error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Upstream refused to serve results (captcha, throttling)
    #[error("blocked by upstream: {0}")]
    Blocked(String),

    /// Invalid worker configuration (proxy URL, user agent)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Timeout
    #[error("operation timed out")]
    Timeout,
}
