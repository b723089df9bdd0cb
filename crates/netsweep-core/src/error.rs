use thiserror::Error;

/// Result type alias for fatal netsweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that stop a run before any item is attempted
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unusable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The operating system refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Configuration problems detected up front
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither explicit nameservers nor the system resolver are available
    #[error("no usable nameservers: configure at least one or enable system resolvers")]
    NoNameservers,

    /// A nameserver entry is not an IP address or socket address
    #[error("invalid nameserver address: {0}")]
    InvalidNameserver(String),

    /// The system resolver configuration could not be loaded
    #[error("system resolver unavailable: {0}")]
    SystemResolver(String),

    /// Nothing to process
    #[error("empty target set: supply at least one domain, IP address or CIDR range")]
    EmptyTargets,

    /// A zero timeout would fail every lookup
    #[error("invalid timeout: must be greater than zero")]
    InvalidTimeout,

    /// Worker pool size must be at least one
    #[error("invalid thread count {0}: at least one worker thread is required")]
    InvalidThreads(usize),

    /// The async runtime backing DNS lookups could not be built
    #[error("failed to start DNS runtime: {0}")]
    Runtime(String),
}

/// Per-item resolution failures, reported as data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The target is not a syntactically valid domain name
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The name does not exist or has no address records
    #[error("no address records for {0}")]
    NotFound(String),

    /// The lookup did not finish in time
    #[error("lookup timed out after {0} ms")]
    Timeout(u128),

    /// Any other resolver failure
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Failure captured from a single worker invocation
#[derive(Error, Debug)]
pub enum TaskError<E> {
    /// The worker returned an error
    #[error("{0}")]
    Failed(E),

    /// The worker panicked; the payload message is kept when it is a string
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl<E> TaskError<E> {
    /// Returns the worker's own error, if it returned one
    #[must_use]
    pub const fn as_failed(&self) -> Option<&E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Panicked(_) => None,
        }
    }

    /// Returns true if the worker panicked instead of returning
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}
