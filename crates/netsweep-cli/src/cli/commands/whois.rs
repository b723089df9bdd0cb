//! `netsweep whois` - bulk WHOIS lookups.

use anyhow::Result;
use netsweep_core::{Target, TaskOutcome};
use netsweep_recon::whois::{WhoisClient, WhoisInfo};
use netsweep_recon::ReconError;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::Context;
use crate::cli::args::WhoisArgs;
use crate::input;
use crate::output::{self, OutputFormat};

pub fn execute(ctx: &Context, args: WhoisArgs) -> Result<()> {
    let tokens = input::collect(&args.input.targets, args.input.file.as_deref())?;
    let names = input::permute(tokens, &args.suffix, &args.tld);
    let targets = names.map(|name| Target::classify(&name));

    let settings = &ctx.config.whois;
    let mut client = WhoisClient::new()?;
    if let Some(secs) = args.timeout.or(settings.timeout) {
        client = client.timeout(Duration::from_secs(secs));
    }
    if let Some(follow) = args.follow.or(settings.follow) {
        client = client.follow(follow);
    }

    let executor = ctx.executor()?;
    info!(threads = executor.max_threads(), "starting whois run");

    let (mut ok, mut failed) = (0_usize, 0_usize);
    for outcome in executor.run(targets, move |target: &Target| client.lookup(target))? {
        if outcome.is_ok() {
            ok += 1;
        } else {
            failed += 1;
        }
        render(ctx, &args, &outcome)?;
    }

    info!(ok, failed, "whois run finished");
    Ok(())
}

fn render(
    ctx: &Context,
    args: &WhoisArgs,
    outcome: &TaskOutcome<Target, WhoisInfo, ReconError>,
) -> Result<()> {
    let subject = outcome.input.to_string();

    match (ctx.output_format, &outcome.result) {
        (OutputFormat::Json, Ok(info)) => {
            let mut record = json!({ "target": subject, "status": "ok", "whois": info });
            if args.raw {
                record["raw"] = json!(info.raw);
            }
            output::json_line(&record)
        }
        (OutputFormat::Json, Err(error)) => output::json_line(&json!({
            "target": subject,
            "status": "failed",
            "error": error.to_string(),
            "panicked": error.is_panic(),
        })),
        (OutputFormat::Pretty, Ok(info)) => {
            print_info(&subject, info, ctx.verbose || args.raw);
            if args.raw {
                println!("{}", info.raw);
            }
            Ok(())
        }
        (OutputFormat::Pretty, Err(error)) => {
            output::failure(&subject, error);
            Ok(())
        }
    }
}

fn print_info(subject: &str, info: &WhoisInfo, detailed: bool) {
    let registrant = info.registrant.as_ref();
    let organization = registrant.and_then(|r| r.organization.as_deref());
    output::ok_header(subject, organization.unwrap_or(""));

    if let Some(registrar) = &info.registrar {
        output::field("registrar", registrar);
    }
    if let Some(country) = registrant.and_then(|r| r.country.as_deref()) {
        output::field("country", country);
    }
    if let Some(created) = &info.creation_date {
        output::field("created", created);
    }
    if let Some(expires) = &info.expiration_date {
        output::field("expires", expires);
    }
    if !info.name_servers.is_empty() {
        output::field("name servers", &info.name_servers.join(", "));
    }
    if detailed {
        for status in &info.status {
            output::field("status", status);
        }
    }
}
