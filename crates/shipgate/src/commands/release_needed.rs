//! Release-needed command: gate a CI build on branch, PR status and
//! publication differences.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use shipgate_core::config::Config;
use shipgate_core::decision::{self, DecisionInputs, ReleaseDecision};
use shipgate_core::git;
use shipgate_core::process::SystemProcessRunner;
use shipgate_core::publications::{self, ComparisonMarker};

const ENV_PULL_REQUEST: &str = "TRAVIS_PULL_REQUEST";
const ENV_SKIP_RELEASE: &str = "SKIP_RELEASE";

/// Arguments for the `release-needed` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseNeededArgs {
    /// Branch being built (default: current git branch)
    #[arg(long, env = "TRAVIS_BRANCH")]
    pub branch: Option<String>,

    /// Commit message of the build
    #[arg(long, env = "TRAVIS_COMMIT_MESSAGE", default_value = "")]
    pub commit_message: String,

    /// Treat the build as a pull request (also set by TRAVIS_PULL_REQUEST)
    #[arg(long)]
    pub pull_request: bool,

    /// Pattern a branch must fully match to release (default from config)
    #[arg(long, value_name = "REGEX")]
    pub releasable_branch_regex: Option<String>,

    /// Release even if publications are unchanged
    #[arg(long)]
    pub skip_compare_publications: bool,

    /// Suppress the release (also set by SKIP_RELEASE)
    #[arg(long)]
    pub skip_release: bool,

    /// Publication comparison result file; non-empty means changed (repeatable)
    #[arg(long = "comparison-result", value_name = "FILE")]
    pub comparison_results: Vec<Utf8PathBuf>,

    /// Exit with an error when no release is needed
    #[arg(long)]
    pub assert: bool,
}

#[derive(Serialize)]
struct DecisionReport<'a> {
    #[serde(flatten)]
    decision: &'a ReleaseDecision,
    publications_differ: bool,
    inputs: &'a DecisionInputs,
    comparison_results: &'a [ComparisonMarker],
}

/// Decide whether the current build should release and print the outcome.
#[instrument(name = "cmd_release_needed", skip_all, fields(assert = args.assert))]
pub fn cmd_release_needed(
    args: ReleaseNeededArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing release-needed command");

    let pull_request_env = std::env::var(ENV_PULL_REQUEST).ok();
    let skip_release_env = std::env::var(ENV_SKIP_RELEASE).ok();

    let branch = match args.branch.clone() {
        Some(branch) => branch,
        None => current_branch(cwd),
    };

    let inputs = DecisionInputs {
        branch,
        releasable_branch_regex: args
            .releasable_branch_regex
            .clone()
            .unwrap_or_else(|| config.release.releasable_branch_regex.clone()),
        commit_message: args.commit_message.clone(),
        pull_request: args.pull_request || pull_request_from_env(pull_request_env.as_deref()),
        skip_compare_publications: args.skip_compare_publications
            || config.release.skip_compare_publications,
        skip_release_requested: args.skip_release || flag_from_env(skip_release_env.as_deref()),
    };

    let paths: Vec<Utf8PathBuf> = args
        .comparison_results
        .iter()
        .map(|path| cwd.join(path))
        .collect();
    let markers = publications::markers_from_files(&paths)
        .context("failed to read publication comparison results")?;
    let publications_differ = publications::has_differences(&markers);

    let decision = decision::decide(&inputs, publications_differ)
        .context("failed to evaluate release decision")?;

    if global_json {
        let report = DecisionReport {
            decision: &decision,
            publications_differ,
            inputs: &inputs,
            comparison_results: &markers,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if decision.should_release {
        println!("{} {}", "✓".green(), "Release needed".green().bold());
        println!("  {}", decision.reason);
    } else {
        println!("{} {}", "○".yellow(), "No release needed".yellow().bold());
        println!("  {}", decision.reason);
    }

    if args.assert && !decision.should_release {
        anyhow::bail!("release not needed: {}", decision.reason);
    }
    Ok(())
}

/// Whether a `TRAVIS_PULL_REQUEST`-style value denotes a pull request.
///
/// Travis sets the PR number for pull request builds and `false` otherwise.
fn pull_request_from_env(value: Option<&str>) -> bool {
    value
        .map(str::trim)
        .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case("false"))
}

/// Whether an on/off environment value is set.
fn flag_from_env(value: Option<&str>) -> bool {
    value
        .map(str::trim)
        .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case("false") && v != "0")
}

/// The checked-out branch, or an empty name when it cannot be determined.
fn current_branch(cwd: &Utf8Path) -> String {
    match git::current_branch(&SystemProcessRunner, cwd) {
        Ok(Some(branch)) => branch,
        Ok(None) => {
            warn!("HEAD is detached and no branch was given; treating branch as unknown");
            String::new()
        }
        Err(err) => {
            warn!(error = %err, "could not determine current branch");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_env_values() {
        assert!(!pull_request_from_env(None));
        assert!(!pull_request_from_env(Some("")));
        assert!(!pull_request_from_env(Some("false")));
        assert!(!pull_request_from_env(Some("FALSE")));
        assert!(pull_request_from_env(Some("123")));
        assert!(pull_request_from_env(Some("true")));
    }

    #[test]
    fn skip_release_env_values() {
        assert!(!flag_from_env(None));
        assert!(!flag_from_env(Some(" ")));
        assert!(!flag_from_env(Some("0")));
        assert!(!flag_from_env(Some("false")));
        assert!(flag_from_env(Some("1")));
        assert!(flag_from_env(Some("yes")));
    }

    #[test]
    fn unknown_branch_outside_git_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        assert_eq!(current_branch(&dir), "");
    }
}
