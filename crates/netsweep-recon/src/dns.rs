//! Target resolution with nameserver rotation.
//!
//! [`Resolver`] turns classified [`Target`]s into a lazily pulled stream of
//! [`ResolutionOutcome`]s:
//!
//! * CIDR ranges expand to every member address. Network and broadcast
//!   addresses are included, so `10.0.0.0/30` yields four addresses.
//! * IP literals pass through unchanged.
//! * Domains are resolved through hickory, one upstream per configured
//!   nameserver (plus the system pool when enabled), picked round-robin.
//!
//! Lookup failures are emitted as [`ResolutionOutcome::Failed`] and never
//! interrupt the stream.
//!
//! [`Resolver::resolve`] looks names up on the pulling thread. When feeding an
//! executor, pass [`expand`] as the input and call [`Resolver::settle`] in the
//! worker so lookups run in parallel instead of under the input cursor.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig as HickoryConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::TokioResolver;
use ipnetwork::IpNetworkIterator;
use netsweep_core::{
    is_valid_domain, ConfigError, PortSet, ResolutionError, ResolutionOutcome, ResolverConfig,
    Target, Transport,
};
use std::iter::Peekable;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Threads driving DNS I/O and timers; lookups themselves run on the callers
const RUNTIME_THREADS: usize = 2;

/// A source of forward lookups.
///
/// Implemented for hickory resolvers; tests and embedders can plug in their own.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Label used in logs
    fn name(&self) -> &str;

    /// Resolve `name` to its addresses in answer order
    async fn lookup_ip(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError>;
}

/// Hickory resolver bound to one nameserver or to the system configuration
pub struct HickoryUpstream {
    name: String,
    resolver: TokioResolver,
}

impl HickoryUpstream {
    /// Resolver that only talks to `addr`
    #[must_use]
    pub fn nameserver(addr: SocketAddr, transport: Transport, opts: ResolverOpts) -> Self {
        let mut config = HickoryConfig::new();
        config.add_name_server(NameServerConfig::new(addr, protocol(transport)));

        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self {
            name: addr.to_string(),
            resolver,
        }
    }

    /// Resolver using the nameservers from the system configuration
    pub fn system(opts: ResolverOpts) -> Result<Self, ConfigError> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| ConfigError::SystemResolver(e.to_string()))?
            .with_options(opts)
            .build();

        Ok(Self {
            name: String::from("system"),
            resolver,
        })
    }
}

#[async_trait]
impl Upstream for HickoryUpstream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup_ip(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
        let response = self
            .resolver
            .lookup_ip(name)
            .await
            .map_err(|e| ResolutionError::Lookup(e.to_string()))?;

        Ok(response.iter().collect())
    }
}

const fn protocol(transport: Transport) -> Protocol {
    match transport {
        Transport::Udp => Protocol::Udp,
        Transport::Tcp => Protocol::Tcp,
    }
}

fn resolver_opts(config: &ResolverConfig) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.timeout;
    opts.attempts = config.attempts.max(1);
    opts
}

/// Forward resolver with round-robin rotation across upstreams.
///
/// Cheap to clone; clones share the upstreams and the rotation cursor.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    runtime: Runtime,
    upstreams: Vec<Box<dyn Upstream>>,
    cursor: AtomicUsize,
    ports: Option<Arc<PortSet>>,
    deadline: Duration,
}

impl Resolver {
    /// Build a resolver from configuration.
    ///
    /// Each explicit nameserver becomes its own upstream so queries rotate
    /// across them. With `use_system_resolvers` the system pool is added as
    /// one more upstream.
    pub fn new(config: &ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let runtime = build_runtime()?;
        let opts = resolver_opts(config);
        let mut upstreams: Vec<Box<dyn Upstream>> = Vec::new();

        {
            let _guard = runtime.enter();

            if config.use_system_resolvers {
                match HickoryUpstream::system(opts.clone()) {
                    Ok(system) => upstreams.push(Box::new(system)),
                    Err(e) if config.nameservers.is_empty() => return Err(e),
                    Err(e) => warn!(error = %e, "ignoring unavailable system resolvers"),
                }
            }

            for addr in &config.nameservers {
                upstreams.push(Box::new(HickoryUpstream::nameserver(
                    *addr,
                    config.transport,
                    opts.clone(),
                )));
            }
        }

        Self::assemble(runtime, upstreams, config)
    }

    /// Build a resolver over caller-supplied upstreams.
    ///
    /// Only `ports`, `timeout` and `attempts` are taken from `config`.
    pub fn with_upstreams(
        upstreams: Vec<Box<dyn Upstream>>,
        config: &ResolverConfig,
    ) -> Result<Self, ConfigError> {
        Self::assemble(build_runtime()?, upstreams, config)
    }

    fn assemble(
        runtime: Runtime,
        upstreams: Vec<Box<dyn Upstream>>,
        config: &ResolverConfig,
    ) -> Result<Self, ConfigError> {
        if upstreams.is_empty() {
            return Err(ConfigError::NoNameservers);
        }
        if config.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        let attempts = u32::try_from(config.attempts.max(1)).unwrap_or(u32::MAX);
        let deadline = config.timeout.saturating_mul(attempts.saturating_add(1));

        debug!(
            upstreams = upstreams.len(),
            deadline_ms = deadline.as_millis(),
            "resolver ready"
        );

        Ok(Self {
            inner: Arc::new(ResolverInner {
                runtime,
                upstreams,
                cursor: AtomicUsize::new(0),
                ports: config.ports.clone().map(Arc::new),
                deadline,
            }),
        })
    }

    /// Labels of the upstreams in rotation order
    pub fn upstreams(&self) -> impl Iterator<Item = &str> {
        self.inner.upstreams.iter().map(|u| u.name())
    }

    /// Resolve `targets` lazily.
    ///
    /// Fails up front only when `targets` is empty. Everything else is
    /// reported per item in the returned stream.
    pub fn resolve<I>(&self, targets: I) -> Result<Resolution<I::IntoIter>, ConfigError>
    where
        I: IntoIterator<Item = Target>,
    {
        Ok(Resolution {
            resolver: self.clone(),
            units: expand(targets)?,
        })
    }

    /// Turn one unit into its outcome, looking the name up if needed.
    ///
    /// Safe to call from many threads at once; lookups proceed concurrently.
    pub fn settle(&self, unit: &Unit) -> ResolutionOutcome {
        match unit {
            Unit::Address { address, source } => self.resolved(*address, source.clone()),
            Unit::Lookup { name } => {
                let source = Target::Domain(name.clone());
                match self.lookup(name) {
                    Ok(address) => self.resolved(address, source),
                    Err(error) => {
                        debug!(target = %source, error = %error, "resolution failed");
                        ResolutionOutcome::Failed { source, error }
                    }
                }
            }
        }
    }

    /// Forward lookup of a single name through the next upstream in rotation.
    ///
    /// Returns the first address of the answer.
    pub fn lookup(&self, name: &str) -> Result<IpAddr, ResolutionError> {
        if !is_valid_domain(name) {
            return Err(ResolutionError::InvalidTarget(name.to_string()));
        }

        let inner = &self.inner;
        let index = inner.cursor.fetch_add(1, Ordering::Relaxed) % inner.upstreams.len();
        let upstream = &inner.upstreams[index];
        let deadline = inner.deadline;

        debug!(name, upstream = upstream.name(), "resolving");

        let addresses = inner
            .runtime
            .block_on(async { tokio::time::timeout(deadline, upstream.lookup_ip(name)).await })
            .map_err(|_| ResolutionError::Timeout(deadline.as_millis()))??;

        addresses
            .first()
            .copied()
            .ok_or_else(|| ResolutionError::NotFound(name.to_string()))
    }

    fn resolved(&self, address: IpAddr, source: Target) -> ResolutionOutcome {
        ResolutionOutcome::Resolved {
            address,
            source,
            ports: self.inner.ports.clone(),
        }
    }
}

fn build_runtime() -> Result<Runtime, ConfigError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(RUNTIME_THREADS)
        .thread_name("netsweep-dns")
        .enable_all()
        .build()
        .map_err(|e| ConfigError::Runtime(e.to_string()))
}

/// One concrete piece of resolution work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// An address known without a lookup: an IP literal or a range member
    Address {
        /// The address itself
        address: IpAddr,
        /// Target it came from
        source: Target,
    },
    /// A name that still needs a forward lookup
    Lookup {
        /// Name as given
        name: String,
    },
}

impl Unit {
    /// The target this unit belongs to
    #[must_use]
    pub fn source(&self) -> Target {
        match self {
            Self::Address { source, .. } => source.clone(),
            Self::Lookup { name } => Target::Domain(name.clone()),
        }
    }

    /// Returns true if settling this unit needs the network
    #[must_use]
    pub const fn needs_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}

/// Split `targets` into units without touching the network.
///
/// Ranges are expanded lazily and IP literals pass through; domains become
/// [`Unit::Lookup`] for [`Resolver::settle`] to resolve, so the pulling
/// thread never waits on DNS.
pub fn expand<I>(targets: I) -> Result<Units<I::IntoIter>, ConfigError>
where
    I: IntoIterator<Item = Target>,
{
    let mut targets = targets.into_iter().peekable();
    if targets.peek().is_none() {
        return Err(ConfigError::EmptyTargets);
    }

    Ok(Units {
        targets,
        expansion: None,
    })
}

/// Members of a CIDR range still to be emitted.
struct Expansion {
    hosts: IpNetworkIterator,
    source: Target,
}

/// Lazy stream of [`Unit`]s.
///
/// Holds at most one target and one range iterator at a time.
pub struct Units<I: Iterator<Item = Target>> {
    targets: Peekable<I>,
    expansion: Option<Expansion>,
}

impl<I: Iterator<Item = Target>> Iterator for Units<I> {
    type Item = Unit;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(expansion) = &mut self.expansion {
                if let Some(address) = expansion.hosts.next() {
                    return Some(Unit::Address {
                        address,
                        source: expansion.source.clone(),
                    });
                }
                self.expansion = None;
            }

            let target = self.targets.next()?;
            match target {
                Target::Ip(address) => {
                    return Some(Unit::Address {
                        address,
                        source: target,
                    })
                }
                Target::Cidr(network) => {
                    self.expansion = Some(Expansion {
                        hosts: network.iter(),
                        source: target,
                    });
                }
                Target::Domain(name) => return Some(Unit::Lookup { name }),
            }
        }
    }
}

/// Lazy stream of resolution outcomes.
///
/// Lookups run on the thread that calls `next`. To resolve several names at
/// once, feed [`expand`] into an executor and [`Resolver::settle`] each unit
/// in the worker instead.
pub struct Resolution<I: Iterator<Item = Target>> {
    resolver: Resolver,
    units: Units<I>,
}

impl<I: Iterator<Item = Target>> Iterator for Resolution<I> {
    type Item = ResolutionOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        self.units.next().map(|unit| self.resolver.settle(&unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskExecutor;
    use std::net::Ipv4Addr;
    use std::time::Instant;

    const ANSWER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    const LAG: Duration = Duration::from_millis(300);

    struct FakeUpstream {
        name: String,
        hits: Arc<AtomicUsize>,
    }

    impl FakeUpstream {
        fn boxed(name: &str) -> (Box<dyn Upstream>, Arc<AtomicUsize>) {
            let hits = Arc::new(AtomicUsize::new(0));
            let upstream = Self {
                name: name.to_string(),
                hits: Arc::clone(&hits),
            };
            (Box::new(upstream), hits)
        }
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        fn name(&self) -> &str {
            &self.name
        }

        async fn lookup_ip(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if name.ends_with(".invalid") {
                return Err(ResolutionError::Lookup(format!("NXDOMAIN for {name}")));
            }
            if name.starts_with("empty.") {
                return Ok(Vec::new());
            }
            if name.starts_with("slow.") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if name.starts_with("lag.") {
                tokio::time::sleep(LAG).await;
            }
            Ok(vec![ANSWER])
        }
    }

    fn fake_resolver(config: &ResolverConfig) -> (Resolver, Arc<AtomicUsize>) {
        let (upstream, hits) = FakeUpstream::boxed("fake");
        (Resolver::with_upstreams(vec![upstream], config).unwrap(), hits)
    }

    fn targets(tokens: &[&str]) -> Vec<Target> {
        tokens.iter().map(|t| Target::classify(t)).collect()
    }

    #[test]
    fn test_cidr_expands_to_every_address() {
        let (resolver, hits) = fake_resolver(&ResolverConfig::default());
        let outcomes: Vec<_> = resolver
            .resolve(targets(&["10.0.0.0/30"]))
            .unwrap()
            .collect();

        let addresses: Vec<IpAddr> = outcomes
            .iter()
            .filter_map(ResolutionOutcome::address)
            .collect();
        let expected: Vec<IpAddr> = (0..4)
            .map(|i| IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)))
            .collect();
        assert_eq!(addresses, expected);

        for outcome in &outcomes {
            assert_eq!(outcome.source().to_string(), "10.0.0.0/30");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_single_host_and_ipv6_ranges() {
        let (resolver, _) = fake_resolver(&ResolverConfig::default());
        assert_eq!(resolver.resolve(targets(&["192.0.2.7/32"])).unwrap().count(), 1);
        assert_eq!(resolver.resolve(targets(&["2001:db8::/126"])).unwrap().count(), 4);
    }

    #[test]
    fn test_large_range_is_not_materialized() {
        let (resolver, _) = fake_resolver(&ResolverConfig::default());
        let first: Vec<_> = resolver
            .resolve(targets(&["10.0.0.0/8"]))
            .unwrap()
            .take(3)
            .filter_map(|o| o.address())
            .collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first[2], IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_ip_passes_through() {
        let (resolver, hits) = fake_resolver(&ResolverConfig::default());
        let outcomes: Vec<_> = resolver.resolve(targets(&["8.8.8.8"])).unwrap().collect();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].address(), Some("8.8.8.8".parse().unwrap()));
        assert_eq!(outcomes[0].source(), &Target::classify("8.8.8.8"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_domain_does_not_stop_the_stream() {
        let (resolver, _) = fake_resolver(&ResolverConfig::default());
        let outcomes: Vec<_> = resolver
            .resolve(targets(&["nonexistent-domain-example.invalid", "example.com"]))
            .unwrap()
            .collect();

        assert_eq!(outcomes.len(), 2);
        match &outcomes[0] {
            ResolutionOutcome::Failed { source, error } => {
                assert_eq!(source.to_string(), "nonexistent-domain-example.invalid");
                assert!(matches!(error, ResolutionError::Lookup(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(outcomes[1].address(), Some(ANSWER));
        assert_eq!(outcomes[1].source().to_string(), "example.com");
    }

    #[test]
    fn test_empty_answer_is_not_found() {
        let (resolver, _) = fake_resolver(&ResolverConfig::default());
        assert_eq!(
            resolver.lookup("empty.example"),
            Err(ResolutionError::NotFound("empty.example".into()))
        );
    }

    #[test]
    fn test_invalid_domain_never_reaches_upstream() {
        let (resolver, hits) = fake_resolver(&ResolverConfig::default());
        let outcomes: Vec<_> = resolver
            .resolve(targets(&["10.0.0.0/33", "bad..name"]))
            .unwrap()
            .collect();

        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes {
            assert!(matches!(
                outcome,
                ResolutionOutcome::Failed {
                    error: ResolutionError::InvalidTarget(_),
                    ..
                }
            ));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_slow_lookup_times_out() {
        let config = ResolverConfig::default()
            .timeout(Duration::from_millis(50))
            .attempts(1);
        let (resolver, _) = fake_resolver(&config);

        assert_eq!(
            resolver.lookup("slow.example"),
            Err(ResolutionError::Timeout(100))
        );
        // The next lookup is unaffected.
        assert_eq!(resolver.lookup("fast.example"), Ok(ANSWER));
    }

    #[test]
    fn test_queries_rotate_across_nameservers() {
        let (first, first_hits) = FakeUpstream::boxed("ns1");
        let (second, second_hits) = FakeUpstream::boxed("ns2");
        let resolver =
            Resolver::with_upstreams(vec![first, second], &ResolverConfig::default()).unwrap();

        let domains: Vec<Target> = (0..100)
            .map(|i| Target::Domain(format!("host{i}.example")))
            .collect();
        let resolved = resolver
            .resolve(domains)
            .unwrap()
            .filter(ResolutionOutcome::is_resolved)
            .count();

        assert_eq!(resolved, 100);
        let (a, b) = (
            first_hits.load(Ordering::SeqCst),
            second_hits.load(Ordering::SeqCst),
        );
        assert!(a > 0 && a < 100, "ns1 received {a}");
        assert!(b > 0 && b < 100, "ns2 received {b}");
        assert_eq!(a + b, 100);
    }

    #[test]
    fn test_ports_are_attached() {
        let config = ResolverConfig::default().ports([80, 443].into_iter().collect());
        let (resolver, _) = fake_resolver(&config);

        for outcome in resolver.resolve(targets(&["10.0.0.0/31", "example.com"])).unwrap() {
            let ResolutionOutcome::Resolved { ports, .. } = outcome else {
                panic!("expected resolution");
            };
            let ports: Vec<u16> = ports.unwrap().iter().copied().collect();
            assert_eq!(ports, vec![80, 443]);
        }
    }

    #[test]
    fn test_empty_target_set_is_a_config_error() {
        let (resolver, _) = fake_resolver(&ResolverConfig::default());
        assert!(matches!(
            resolver.resolve(Vec::new()),
            Err(ConfigError::EmptyTargets)
        ));
    }

    #[test]
    fn test_no_upstreams_is_a_config_error() {
        assert!(matches!(
            Resolver::with_upstreams(Vec::new(), &ResolverConfig::default()),
            Err(ConfigError::NoNameservers)
        ));
        assert!(matches!(
            Resolver::new(&ResolverConfig::new().use_system_resolvers(false)),
            Err(ConfigError::NoNameservers)
        ));
    }

    #[test]
    fn test_zero_timeout_is_a_config_error() {
        let (upstream, _) = FakeUpstream::boxed("fake");
        let config = ResolverConfig::default().timeout(Duration::ZERO);
        assert!(matches!(
            Resolver::with_upstreams(vec![upstream], &config),
            Err(ConfigError::InvalidTimeout)
        ));
    }

    #[test]
    fn test_each_nameserver_is_an_upstream() {
        let config = ResolverConfig::new()
            .use_system_resolvers(false)
            .nameserver("192.0.2.53:53".parse().unwrap())
            .nameserver("192.0.2.54:53".parse().unwrap())
            .transport(Transport::Tcp);
        let resolver = Resolver::new(&config).unwrap();

        assert_eq!(
            resolver.upstreams().collect::<Vec<_>>(),
            vec!["192.0.2.53:53", "192.0.2.54:53"]
        );
    }

    #[test]
    fn test_resolution_feeds_the_executor() {
        let (resolver, _) = fake_resolver(&ResolverConfig::default());
        let resolution = resolver
            .resolve(targets(&["10.0.0.0/30", "example.com", "x.invalid"]))
            .unwrap();

        let executor = TaskExecutor::new(3).unwrap();
        let outcomes: Vec<_> = executor
            .run(resolution, |outcome| {
                outcome.address().ok_or("unresolved")
            })
            .unwrap()
            .collect();

        assert_eq!(outcomes.len(), 6);
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 5);
    }

    #[test]
    fn test_expand_defers_lookups() {
        let units: Vec<Unit> = expand(targets(&["192.0.2.9", "10.0.0.0/31", "example.com"]))
            .unwrap()
            .collect();

        assert_eq!(units.len(), 4);
        assert!(!units[0].needs_lookup());
        assert_eq!(units[2].source().to_string(), "10.0.0.0/31");
        assert_eq!(
            units[3],
            Unit::Lookup {
                name: "example.com".into()
            }
        );
        assert!(matches!(expand(Vec::new()), Err(ConfigError::EmptyTargets)));
    }

    #[test]
    fn test_lookups_in_workers_run_concurrently() {
        let (resolver, hits) = fake_resolver(&ResolverConfig::default());
        let names: Vec<Target> = (0..4)
            .map(|i| Target::Domain(format!("lag.host{i}.example")))
            .collect();

        let started = Instant::now();
        let executor = TaskExecutor::new(4).unwrap();
        let resolved = executor
            .run(expand(names).unwrap(), move |unit| {
                Ok::<_, ()>(resolver.settle(unit))
            })
            .unwrap()
            .filter(|o| o.result.as_ref().is_ok_and(ResolutionOutcome::is_resolved))
            .count();
        let elapsed = started.elapsed();

        assert_eq!(resolved, 4);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert!(elapsed < LAG * 3, "four lookups took {elapsed:?}");
    }

    #[test]
    fn test_timeout_does_not_hold_back_other_workers() {
        let config = ResolverConfig::default()
            .timeout(Duration::from_millis(500))
            .attempts(1);
        let (resolver, _) = fake_resolver(&config);

        let executor = TaskExecutor::new(2).unwrap();
        let first = executor
            .run(
                expand(targets(&["slow.example", "fast.example"])).unwrap(),
                move |unit| Ok::<_, ()>(resolver.settle(unit)),
            )
            .unwrap()
            .next()
            .unwrap();

        assert_eq!(first.input.source().to_string(), "fast.example");
    }

    #[test]
    #[ignore = "requires network access"]
    fn test_system_resolver_against_real_dns() {
        let resolver = Resolver::new(&ResolverConfig::default()).unwrap();
        let outcomes: Vec<_> = resolver
            .resolve(targets(&["nonexistent-domain-example.invalid", "example.com"]))
            .unwrap()
            .collect();

        assert!(!outcomes[0].is_resolved());
        assert!(outcomes[1].is_resolved());
    }
}
