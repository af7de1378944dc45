//! Release gating.
//!
//! [`decide`] applies the gating rules in a fixed order; the first rule
//! that matches produces the decision:
//!
//! 1. pull request builds never release
//! 2. the branch must fully match the releasable-branch pattern
//! 3. an explicit skip (commit message keyword or request flag) stops the release
//! 4. unless comparison is skipped, the publications must differ
//!
//! Anything that passes all four releases. A "no release" outcome is a
//! normal [`ReleaseDecision`], not an error; the only error is a branch
//! pattern that does not compile.

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

/// Commit message keyword that suppresses a release.
pub const SKIP_RELEASE_KEYWORD: &str = "[ci skip-release]";

/// Default pattern for branches allowed to release.
pub const DEFAULT_RELEASABLE_BRANCH_REGEX: &str = "master|release/.+";

/// Errors from release gating.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    /// The releasable-branch pattern is not a valid regular expression.
    #[error("invalid releasable branch regex '{pattern}': {message}")]
    InvalidBranchRegex {
        /// The pattern as configured.
        pattern: String,
        /// Compiler diagnostic.
        message: String,
    },
}

/// Result alias for release gating.
pub type DecisionResult<T> = Result<T, DecisionError>;

/// Everything the gate looks at besides the publication comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DecisionInputs {
    /// Branch being built.
    pub branch: String,
    /// Pattern a branch must fully match to be releasable.
    pub releasable_branch_regex: String,
    /// Message of the commit that triggered the build.
    pub commit_message: String,
    /// Whether the build is for a pull request.
    pub pull_request: bool,
    /// Release without consulting the publication comparison.
    pub skip_compare_publications: bool,
    /// Release suppressed from outside (e.g. `SKIP_RELEASE` is set).
    pub skip_release_requested: bool,
}

/// Which rule settled the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    /// Rule 1: building a pull request.
    PullRequest,
    /// Rule 2: branch does not match the pattern.
    BranchNotReleasable,
    /// Rule 3: release explicitly skipped.
    SkipRequested,
    /// Rule 4: comparison found no differences.
    NoPublicationDifferences,
    /// All rules passed.
    Release,
}

/// Outcome of release gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDecision {
    /// Whether a release should be cut.
    pub should_release: bool,
    /// Human-readable explanation, present for every outcome.
    pub reason: String,
    /// The rule that produced this decision.
    pub rule: DecisionRule,
}

impl ReleaseDecision {
    fn skip(rule: DecisionRule, reason: &str) -> Self {
        Self {
            should_release: false,
            reason: reason.to_string(),
            rule,
        }
    }
}

/// Decide whether to release.
///
/// `publications_differ` is the reduced comparison signal from
/// [`publications::has_differences`](crate::publications::has_differences).
/// The branch pattern is only compiled once rules before it have passed,
/// so a pull request build is decided even with a broken pattern.
#[instrument(skip(inputs), fields(branch = %inputs.branch, pull_request = inputs.pull_request))]
pub fn decide(inputs: &DecisionInputs, publications_differ: bool) -> DecisionResult<ReleaseDecision> {
    let decision = evaluate(inputs, publications_differ)?;
    info!(
        should_release = decision.should_release,
        reason = %decision.reason,
        "release decision"
    );
    Ok(decision)
}

fn evaluate(inputs: &DecisionInputs, publications_differ: bool) -> DecisionResult<ReleaseDecision> {
    if inputs.pull_request {
        return Ok(ReleaseDecision::skip(
            DecisionRule::PullRequest,
            "building a pull request",
        ));
    }

    if !branch_matches(&inputs.releasable_branch_regex, &inputs.branch)? {
        return Ok(ReleaseDecision::skip(
            DecisionRule::BranchNotReleasable,
            "branch not releasable",
        ));
    }

    if inputs.skip_release_requested || inputs.commit_message.contains(SKIP_RELEASE_KEYWORD) {
        return Ok(ReleaseDecision::skip(
            DecisionRule::SkipRequested,
            "release skipped by request",
        ));
    }

    if !inputs.skip_compare_publications && !publications_differ {
        return Ok(ReleaseDecision::skip(
            DecisionRule::NoPublicationDifferences,
            "no publication differences detected",
        ));
    }

    let reason = if inputs.skip_compare_publications {
        "all gating conditions satisfied (publication comparison skipped)"
    } else {
        "all gating conditions satisfied"
    };
    Ok(ReleaseDecision {
        should_release: true,
        reason: reason.to_string(),
        rule: DecisionRule::Release,
    })
}

/// Whether `branch` matches `pattern` in full, not as a substring.
fn branch_matches(pattern: &str, branch: &str) -> DecisionResult<bool> {
    let anchored = format!("^(?:{pattern})$");
    let regex = Regex::new(&anchored).map_err(|e| DecisionError::InvalidBranchRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(regex.is_match(branch))
}
