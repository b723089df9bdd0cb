//! Target ingestion, name permutations and port lists.

use anyhow::{bail, Context as _, Result};
use netsweep_core::{ConfigError, PortSet, Target};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Collect target tokens from arguments and an optional file.
///
/// `-` as the file reads stdin. Tokens are deduplicated; an empty result is a
/// configuration error.
pub fn collect(args: &[String], file: Option<&Path>) -> Result<BTreeSet<String>> {
    let mut tokens = BTreeSet::new();

    for arg in args {
        add_line(&mut tokens, arg);
    }

    match file {
        Some(path) if path == Path::new("-") => read_lines(io::stdin().lock(), &mut tokens)
            .context("reading targets from stdin")?,
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            read_lines(BufReader::new(file), &mut tokens)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        None => {}
    }

    if tokens.is_empty() {
        return Err(ConfigError::EmptyTargets.into());
    }
    Ok(tokens)
}

/// Add every token in `reader`, one or more per line.
pub fn read_lines<R: BufRead>(reader: R, tokens: &mut BTreeSet<String>) -> io::Result<()> {
    for line in reader.lines() {
        add_line(tokens, &line?);
    }
    Ok(())
}

fn add_line(tokens: &mut BTreeSet<String>, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }
    tokens.extend(
        line.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    );
}

/// Expand base names with suffixes and TLDs.
///
/// Each domain `stem.tld` yields `stem + suffix + "." + tld` for the empty
/// suffix plus every given suffix, over every given TLD (or its own TLD when
/// none are given). Addresses and ranges pass through. Duplicates are dropped.
pub fn permute<I>(
    bases: I,
    suffixes: &[String],
    tlds: &[String],
) -> impl Iterator<Item = String> + Send + 'static
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    let suffixes: Vec<String> = std::iter::once(String::new())
        .chain(suffixes.iter().map(|s| s.trim().to_string()))
        .collect();
    let tlds: Vec<String> = tlds
        .iter()
        .map(|t| t.trim().trim_start_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    let mut seen = HashSet::new();

    bases
        .into_iter()
        .flat_map(move |base| expand(&base, &suffixes, &tlds))
        .filter(move |name| seen.insert(name.clone()))
}

fn expand(base: &str, suffixes: &[String], tlds: &[String]) -> Vec<String> {
    if !Target::classify(base).is_domain() {
        return vec![base.to_string()];
    }

    let base = base.trim_end_matches('.');
    let (stem, own_tld) = match base.rsplit_once('.') {
        Some((stem, tld)) => (stem, Some(tld)),
        None => (base, None),
    };
    let tlds: Vec<&str> = if tlds.is_empty() {
        own_tld.into_iter().collect()
    } else {
        tlds.iter().map(String::as_str).collect()
    };

    let mut names = Vec::with_capacity(suffixes.len() * tlds.len().max(1));
    for suffix in suffixes {
        if tlds.is_empty() {
            names.push(format!("{stem}{suffix}"));
        }
        for tld in &tlds {
            names.push(format!("{stem}{suffix}.{tld}"));
        }
    }
    names
}

/// Parse a port list such as `80,443,8000-8010`.
pub fn parse_ports(spec: &str) -> Result<PortSet> {
    let mut ports = PortSet::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start)?;
            let end = parse_port(end)?;
            if start > end {
                bail!("invalid port range {part}: start is after end");
            }
            ports.extend(start..=end);
        } else {
            ports.insert(parse_port(part)?);
        }
    }

    if ports.is_empty() {
        bail!("empty port list");
    }
    Ok(ports)
}

fn parse_port(s: &str) -> Result<u16> {
    let port: u16 = s
        .trim()
        .parse()
        .with_context(|| format!("invalid port {s:?}"))?;
    if port == 0 {
        bail!("invalid port 0");
    }
    Ok(port)
}
