//! Git queries used by the release pipeline.
//!
//! Shells out to `git` through a [`ProcessRunner`]. This ensures we inherit
//! the user's configuration (insteadOf rewrites, credential helpers) and
//! keeps the queries testable with a scripted runner.

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::process::ProcessRunner;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed (exit code {exit_code}): {stderr}")]
    Command {
        /// The git invocation that failed (e.g., "remote get-url origin").
        command: String,
        /// Exit code reported by git.
        exit_code: i32,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Get the URL configured for a named remote (usually `"origin"`).
#[instrument(skip(runner), fields(dir = %dir))]
pub fn remote_url(runner: &impl ProcessRunner, dir: &Utf8Path, remote: &str) -> GitResult<String> {
    let url = git(runner, dir, &["remote", "get-url", remote])?
        .trim()
        .to_string();
    debug!(%remote, "read remote URL");
    Ok(url)
}

/// Get the current branch name.
///
/// Returns `None` in a detached HEAD state, which is how most CI systems
/// check out a commit.
#[instrument(skip(runner), fields(dir = %dir))]
pub fn current_branch(runner: &impl ProcessRunner, dir: &Utf8Path) -> GitResult<Option<String>> {
    let output = git(runner, dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.trim();
    if branch == "HEAD" || branch.is_empty() {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch.to_string()))
    }
}

/// Run a git command and return its stdout.
fn git(runner: &impl ProcessRunner, dir: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let mut command = Vec::with_capacity(args.len() + 1);
    command.push("git");
    command.extend_from_slice(args);

    let output = runner.run(&command, dir)?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(GitError::Command {
            command: args.join(" "),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}
