//! Contributors commands: fetch from GitHub and show the stored snapshot.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info, instrument};

use shipgate_core::RepositoryIdentity;
use shipgate_core::config::Config;
use shipgate_core::contributors::{ContributorsAggregator, ProjectContributorsSnapshot};
use shipgate_core::github::HttpGitHubClient;
use shipgate_core::origin::GitOriginResolver;
use shipgate_core::store;

/// Fallback variable for the GitHub token.
const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// `contributors` subcommands.
#[derive(Subcommand, Debug)]
pub enum ContributorsCommand {
    /// Fetch contributors from GitHub and save the snapshot
    Fetch(FetchArgs),
    /// Print the saved snapshot
    Show(ShowArgs),
}

/// Arguments for `contributors fetch`.
#[derive(Args, Debug, Default)]
pub struct FetchArgs {
    /// Additional repository to aggregate, as owner/repo (repeatable)
    #[arg(short, long = "repository", value_name = "OWNER/REPO")]
    pub repositories: Vec<RepositoryIdentity>,

    /// Don't include the repository behind the origin remote
    #[arg(long)]
    pub no_origin: bool,

    /// Where to write the snapshot (default from config)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Look up each contributor's display name (one request per login)
    #[arg(long)]
    pub resolve_names: bool,

    /// Read-only GitHub token
    #[arg(long, env = "GH_READ_ONLY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for `contributors show`.
#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Snapshot to read (default from config)
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<Utf8PathBuf>,

    /// Show at most N contributors
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Dispatch a `contributors` subcommand.
pub fn cmd_contributors(
    command: ContributorsCommand,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    match command {
        ContributorsCommand::Fetch(args) => cmd_fetch(args, global_json, config, cwd),
        ContributorsCommand::Show(args) => cmd_show(args, global_json, config, cwd),
    }
}

#[derive(Serialize)]
struct FetchReport<'a> {
    output_file: &'a str,
    repositories: Vec<String>,
    contributors: usize,
    contributions: u64,
}

#[instrument(name = "cmd_contributors_fetch", skip_all)]
fn cmd_fetch(
    args: FetchArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing contributors fetch");

    let identities = collect_repositories(&args, config, cwd)?;
    if identities.is_empty() {
        anyhow::bail!("no repositories to fetch; drop --no-origin or pass --repository");
    }

    let token = resolve_token(args.token, std::env::var(ENV_GITHUB_TOKEN).ok(), config);
    if token.is_none() {
        info!("no GitHub token configured, using unauthenticated requests");
    }

    let github = &config.github;
    let client = HttpGitHubClient::new(&github.api_url, github.page_size, github.timeout())
        .context("failed to set up GitHub client")?;
    let aggregator = ContributorsAggregator::with_retry_policy(client, github.retry_policy())
        .resolving_names(args.resolve_names || github.resolve_names);
    let snapshot = aggregator
        .fetch_all(&identities, token.as_deref())
        .context("failed to fetch contributors")?;

    let output = resolve_path(cwd, args.output.as_deref(), &config.contributors.output_file);
    store::save(&snapshot, &output).context("failed to save contributors snapshot")?;

    if global_json {
        let report = FetchReport {
            output_file: output.as_str(),
            repositories: identities.iter().map(ToString::to_string).collect(),
            contributors: snapshot.len(),
            contributions: snapshot.total_contributions(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} {} contributors from {} repositories",
            "Saved".green().bold(),
            snapshot.len(),
            identities.len()
        );
        println!("{}: {}", "Snapshot".dimmed(), output.cyan());
    }

    Ok(())
}

#[instrument(name = "cmd_contributors_show", skip_all)]
fn cmd_show(
    args: ShowArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing contributors show");

    let path = resolve_path(cwd, args.file.as_deref(), &config.contributors.output_file);
    let snapshot = store::load(&path).context("failed to load contributors snapshot")?;
    let shown = args.limit.unwrap_or(usize::MAX).min(snapshot.len());
    let records = &snapshot.contributors()[..shown];

    if global_json {
        let limited = ProjectContributorsSnapshot::from_records(records.to_vec());
        println!("{}", serde_json::to_string_pretty(&limited)?);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("{} {}", "No contributors in".yellow(), path.yellow());
        return Ok(());
    }

    let login_width = records.iter().map(|r| r.login.len()).max().unwrap_or(0);
    for record in records {
        println!(
            "{:>7}  {:<login_width$}  {}  {}",
            record.contributions.to_string().green(),
            record.login.bold(),
            record.name,
            format!("({})", record.repository).dimmed(),
        );
    }
    if shown < snapshot.len() {
        println!("{}", format!("… and {} more", snapshot.len() - shown).dimmed());
    }

    Ok(())
}

/// Origin first, then configured repositories, then `--repository` flags.
fn collect_repositories(
    args: &FetchArgs,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<Vec<RepositoryIdentity>> {
    let mut identities = Vec::new();
    if !args.no_origin {
        let origin = GitOriginResolver::new(cwd)
            .resolve()
            .context("failed to resolve origin repository (use --no-origin to skip)")?;
        identities.push(origin);
    }
    identities.extend(config.github.repositories.iter().cloned());
    identities.extend(args.repositories.iter().cloned());
    Ok(identities)
}

/// Flag (or `GH_READ_ONLY_TOKEN`) first, then `GITHUB_TOKEN`, then config.
fn resolve_token(flag: Option<String>, env_fallback: Option<String>, config: &Config) -> Option<String> {
    flag.into_iter()
        .chain(env_fallback)
        .chain(config.github.read_only_auth_token.clone())
        .find(|token| !token.trim().is_empty())
}

fn resolve_path(cwd: &Utf8Path, flag: Option<&Utf8Path>, configured: &Utf8Path) -> Utf8PathBuf {
    cwd.join(flag.unwrap_or(configured))
}
