//! `netsweep bing` - find pages Bing indexed for each resolved address.

use anyhow::Result;
use netsweep_core::{
    parse_nameserver, ConfigError, ParentIndex, ResolutionOutcome, ResolverConfig, Target,
    TaskError, Transport,
};
use netsweep_recon::bing::{BingConfig, BingSearch, SearchHit};
use netsweep_recon::{expand, ReconError, Resolver, TaskExecutor};
use serde_json::json;
use std::collections::HashSet;
use std::convert::Infallible;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};

use super::Context;
use crate::cli::args::BingArgs;
use crate::input;
use crate::output::{self, OutputFormat};

/// One line of sweep output.
#[derive(Debug)]
pub enum Report<R, E> {
    /// A domain that produced no address
    Unresolved { source: Target, error: String },
    /// An address and what searching it gave
    Searched {
        resolution: ResolutionOutcome,
        /// Every domain that resolved to this address
        parents: Vec<String>,
        result: Result<R, TaskError<E>>,
    },
}

pub fn execute(ctx: &Context, args: BingArgs) -> Result<()> {
    let tokens = input::collect(&args.input.targets, args.input.file.as_deref())?;

    let resolver = Resolver::new(&resolver_config(ctx, &args)?)?;
    info!(
        upstreams = %resolver.upstreams().collect::<Vec<_>>().join(", "),
        "resolver configured"
    );
    let bing = BingSearch::new(&bing_config(ctx, &args))?;

    let executor = ctx.executor()?;
    info!(threads = executor.max_threads(), "starting bing run");

    let targets = tokens.iter().map(|t| Target::classify(t)).collect();
    sweep(
        &resolver,
        &executor,
        targets,
        move |address| bing.search(address),
        |report| render(ctx, &report),
    )
}

/// Resolve `targets` and run `search` once per distinct address.
///
/// Domains are resolved first, in parallel on `executor`, so the parents of
/// every address are known before anything is reported. IP literals and
/// range members are then streamed lazily behind the resolved domains.
pub fn sweep<R, E, S, K>(
    resolver: &Resolver,
    executor: &TaskExecutor,
    targets: Vec<Target>,
    search: S,
    mut sink: K,
) -> Result<()>
where
    R: Send + 'static,
    E: Send + 'static,
    S: Fn(IpAddr) -> Result<R, E> + Send + Sync + 'static,
    K: FnMut(Report<R, E>) -> Result<()>,
{
    if targets.is_empty() {
        return Err(ConfigError::EmptyTargets.into());
    }
    let (domains, literals): (Vec<Target>, Vec<Target>) = targets
        .into_iter()
        .partition(|t| matches!(t, Target::Domain(_)));

    let mut index = ParentIndex::new();
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    if !domains.is_empty() {
        let settle = resolver.clone();
        let lookups = executor.run(expand(domains)?, move |unit| {
            Ok::<_, Infallible>(settle.settle(unit))
        })?;

        for outcome in lookups {
            match outcome.result {
                Ok(resolution) => match resolution.address() {
                    Some(address) => {
                        index.observe(&resolution);
                        if seen.insert(address) {
                            found.push((address, resolution));
                        }
                    }
                    None => sink(Report::Unresolved {
                        source: resolution.source().clone(),
                        error: failure_reason(&resolution),
                    })?,
                },
                Err(error) => sink(Report::Unresolved {
                    source: outcome.input.source(),
                    error: error.to_string(),
                })?,
            }
        }
        debug!(addresses = found.len(), linked = index.len(), "domains resolved");
    }

    let literals = if literals.is_empty() {
        None
    } else {
        Some(expand(literals)?)
    };
    let settle = resolver.clone();
    let work = found
        .into_iter()
        .chain(
            literals
                .into_iter()
                .flatten()
                .map(move |unit| settle.settle(&unit))
                .filter_map(|resolution| resolution.address().map(|a| (a, resolution))),
        )
        .filter(move |(address, _)| seen.insert(*address));

    let searches = executor.run(work, move |(address, _): &(IpAddr, ResolutionOutcome)| {
        search(*address)
    })?;

    for outcome in searches {
        let (address, resolution) = outcome.input;
        let parents = index
            .parents_of(&address)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default();
        sink(Report::Searched {
            resolution,
            parents,
            result: outcome.result,
        })?;
    }

    Ok(())
}

fn failure_reason(resolution: &ResolutionOutcome) -> String {
    match resolution {
        ResolutionOutcome::Failed { error, .. } => error.to_string(),
        ResolutionOutcome::Resolved { .. } => String::new(),
    }
}

/// Resolver settings from the config file, overridden by flags.
///
/// Explicit nameservers replace the system resolvers unless
/// `--system-resolvers` is also given.
pub fn resolver_config(ctx: &Context, args: &BingArgs) -> Result<ResolverConfig> {
    let mut config = ctx.config.resolver.clone();

    if !args.nameserver.is_empty() {
        config.nameservers = args
            .nameserver
            .iter()
            .map(|s| parse_nameserver(s))
            .collect::<Result<_, _>>()?;
        config.use_system_resolvers = args.system_resolvers;
    } else if args.system_resolvers {
        config.use_system_resolvers = true;
    }

    if args.tcp {
        config.transport = Transport::Tcp;
    }
    if let Some(ports) = &args.ports {
        config.ports = Some(input::parse_ports(ports)?);
    }
    if let Some(secs) = args.dns_timeout {
        config.timeout = Duration::try_from_secs_f64(secs)
            .map_err(|e| anyhow::anyhow!("invalid DNS timeout {secs}: {e}"))?;
    }

    config.validate()?;
    Ok(config)
}

fn bing_config(ctx: &Context, args: &BingArgs) -> BingConfig {
    let settings = &ctx.config.bing;
    let defaults = BingConfig::default();

    BingConfig {
        user_agent: args
            .user_agent
            .clone()
            .or_else(|| settings.user_agent.clone())
            .unwrap_or(defaults.user_agent),
        proxy: args.proxy.clone().or_else(|| settings.proxy.clone()),
        timeout: args
            .timeout
            .or(settings.timeout)
            .map_or(defaults.timeout, Duration::from_secs),
        pages: args.pages.or(settings.pages).unwrap_or(defaults.pages),
        ..defaults
    }
}

fn render(ctx: &Context, report: &Report<Vec<SearchHit>, ReconError>) -> Result<()> {
    let (resolution, parents, result) = match report {
        Report::Unresolved { source, error } => {
            return match ctx.output_format {
                OutputFormat::Json => output::json_line(&json!({
                    "target": source.to_string(),
                    "status": "unresolved",
                    "error": error,
                })),
                OutputFormat::Pretty => {
                    output::failure(&source.to_string(), error);
                    Ok(())
                }
            };
        }
        Report::Searched {
            resolution,
            parents,
            result,
        } => (resolution, parents, result),
    };

    let source = resolution.source().to_string();
    let ResolutionOutcome::Resolved { address, ports, .. } = resolution else {
        return Ok(());
    };
    let address = address.to_string();
    let ports: Vec<u16> = ports
        .as_deref()
        .map(|p| p.iter().copied().collect())
        .unwrap_or_default();

    match (ctx.output_format, result) {
        (OutputFormat::Json, Ok(hits)) => output::json_line(&json!({
            "address": address,
            "source": source,
            "parents": parents,
            "ports": ports,
            "status": "ok",
            "hits": hits,
        })),
        (OutputFormat::Json, Err(error)) => output::json_line(&json!({
            "address": address,
            "source": source,
            "parents": parents,
            "status": "failed",
            "error": error.to_string(),
        })),
        (OutputFormat::Pretty, Ok(hits)) => {
            output::ok_header(&address, &describe(&source, parents, &ports, hits.len()));
            for hit in hits {
                println!("    {} {}", hit.url, hit.title);
            }
            Ok(())
        }
        (OutputFormat::Pretty, Err(error)) => {
            output::failure(&address, error);
            Ok(())
        }
    }
}

fn describe(source: &str, parents: &[String], ports: &[u16], hits: usize) -> String {
    let mut detail = if parents.is_empty() {
        format!("({source})")
    } else {
        format!("({})", parents.join(", "))
    };
    if !ports.is_empty() {
        let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
        detail.push_str(&format!(" ports {}", ports.join(",")));
    }
    detail.push_str(&format!(" {hits} hit{}", if hits == 1 { "" } else { "s" }));
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::config::Config;
    use async_trait::async_trait;
    use clap::Parser;
    use netsweep_core::ResolutionError;
    use netsweep_recon::Upstream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn bing_args(argv: &[&str]) -> BingArgs {
        let cli = Cli::try_parse_from(["netsweep", "bing"].iter().chain(argv)).unwrap();
        match cli.command {
            Commands::Bing(args) => args,
            other => panic!("expected bing, got {other:?}"),
        }
    }

    fn context(config: Config) -> Context {
        Context {
            output_format: OutputFormat::Pretty,
            threads: 2,
            verbose: false,
            config_path: None,
            config,
        }
    }

    #[test]
    fn test_nameservers_replace_system_resolvers() {
        let ctx = context(Config::default());
        let config =
            resolver_config(&ctx, &bing_args(&["-n", "1.1.1.1,9.9.9.9:5353", "x"])).unwrap();

        assert_eq!(config.nameservers.len(), 2);
        assert_eq!(config.nameservers[1].port(), 5353);
        assert!(!config.use_system_resolvers);

        let config = resolver_config(
            &ctx,
            &bing_args(&["-n", "1.1.1.1", "--system-resolvers", "x"]),
        )
        .unwrap();
        assert!(config.use_system_resolvers);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = Config::default();
        file.resolver.timeout = Duration::from_secs(9);
        file.bing.pages = Some(7);
        file.bing.proxy = Some("http://127.0.0.1:8080".into());
        let ctx = context(file);

        let args = bing_args(&[
            "--tcp",
            "--ports",
            "443,80",
            "--dns-timeout",
            "1.5",
            "--pages",
            "1",
            "x",
        ]);
        let config = resolver_config(&ctx, &args).unwrap();
        assert_eq!(config.transport, Transport::Tcp);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(
            config.ports.unwrap().into_iter().collect::<Vec<_>>(),
            vec![80, 443]
        );

        let bing = bing_config(&ctx, &args);
        assert_eq!(bing.pages, 1);
        assert_eq!(bing.proxy.as_deref(), Some("http://127.0.0.1:8080"));
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        let ctx = context(Config::default());
        assert!(resolver_config(&ctx, &bing_args(&["-n", "dns.example", "x"])).is_err());
        assert!(resolver_config(&ctx, &bing_args(&["--ports", "99999", "x"])).is_err());
        assert!(resolver_config(&ctx, &bing_args(&["--dns-timeout", "0", "x"])).is_err());
    }

    /// Answers every name with the same address, except `missing.*`.
    struct OneAddress;

    #[async_trait]
    impl Upstream for OneAddress {
        fn name(&self) -> &str {
            "one-address"
        }

        async fn lookup_ip(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
            if name.starts_with("missing.") {
                return Ok(Vec::new());
            }
            Ok(vec!["1.2.3.4".parse().unwrap()])
        }
    }

    fn one_address_resolver() -> Resolver {
        let upstream: Box<dyn Upstream> = Box::new(OneAddress);
        Resolver::with_upstreams(vec![upstream], &ResolverConfig::default()).unwrap()
    }

    fn run_sweep(threads: usize, tokens: &[&str]) -> (Vec<Report<IpAddr, Infallible>>, usize) {
        let resolver = one_address_resolver();
        let executor = TaskExecutor::new(threads).unwrap();
        let searches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&searches);

        let mut reports = Vec::new();
        sweep(
            &resolver,
            &executor,
            tokens.iter().map(|t| Target::classify(t)).collect(),
            move |address| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(address)
            },
            |report| {
                reports.push(report);
                Ok(())
            },
        )
        .unwrap();

        (reports, searches.load(Ordering::SeqCst))
    }

    fn searched(reports: &[Report<IpAddr, Infallible>]) -> Vec<(IpAddr, Vec<String>)> {
        reports
            .iter()
            .filter_map(|r| match r {
                Report::Searched {
                    resolution,
                    parents,
                    ..
                } => resolution.address().map(|a| (a, parents.clone())),
                Report::Unresolved { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_domain_after_its_address_is_still_reported() {
        let (reports, searches) = run_sweep(1, &["1.2.3.4", "a.example"]);

        assert_eq!(searches, 1);
        assert_eq!(
            searched(&reports),
            vec![("1.2.3.4".parse().unwrap(), vec!["a.example".to_string()])]
        );
    }

    #[test]
    fn test_every_parent_is_listed_once_per_address() {
        let (reports, searches) = run_sweep(
            3,
            &["a.example", "1.2.3.4", "missing.example", "b.example", "10.0.0.0/31"],
        );

        assert_eq!(searches, 3);
        let mut lines = searched(&reports);
        lines.sort();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            (
                "1.2.3.4".parse().unwrap(),
                vec!["a.example".to_string(), "b.example".to_string()]
            )
        );
        assert!(lines[1].1.is_empty() && lines[2].1.is_empty());

        let unresolved: Vec<String> = reports
            .iter()
            .filter_map(|r| match r {
                Report::Unresolved { source, .. } => Some(source.to_string()),
                Report::Searched { .. } => None,
            })
            .collect();
        assert_eq!(unresolved, vec!["missing.example"]);
    }

    #[test]
    fn test_sweep_without_targets_fails() {
        let resolver = one_address_resolver();
        let executor = TaskExecutor::new(1).unwrap();

        let result = sweep(
            &resolver,
            &executor,
            Vec::new(),
            |address| Ok::<_, Infallible>(address),
            |_| Ok(()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("10.0.0.0/30", &[], &[], 1), "(10.0.0.0/30) 1 hit");
        assert_eq!(
            describe(
                "a.example",
                &["a.example".into(), "b.example".into()],
                &[80, 443],
                3
            ),
            "(a.example, b.example) ports 80,443 3 hits"
        );
    }
}
