//! Origin command: show the GitHub repository behind a git remote.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument};

use shipgate_core::origin::{DEFAULT_REMOTE, GitOriginResolver};

/// Arguments for the `origin` subcommand.
#[derive(Args, Debug)]
pub struct OriginArgs {
    /// Remote to resolve
    #[arg(long, default_value = DEFAULT_REMOTE)]
    pub remote: String,
}

#[derive(Serialize)]
struct OriginReport<'a> {
    repository: String,
    owner: &'a str,
    name: &'a str,
    remote: &'a str,
    remote_url: &'a str,
}

/// Resolve and print the origin repository.
#[instrument(name = "cmd_origin", skip_all, fields(remote = %args.remote))]
pub fn cmd_origin(args: OriginArgs, global_json: bool, cwd: &camino::Utf8Path) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing origin command");

    let resolver = GitOriginResolver::new(cwd).with_remote(&args.remote);
    let origin = resolver
        .resolve_origin()
        .with_context(|| format!("failed to resolve repository of remote '{}'", args.remote))?;

    if global_json {
        let report = OriginReport {
            repository: origin.identity.to_string(),
            owner: origin.identity.owner(),
            name: origin.identity.name(),
            remote: &args.remote,
            remote_url: &origin.remote_url,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", origin.identity);
    }

    Ok(())
}
