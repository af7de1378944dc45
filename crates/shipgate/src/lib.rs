//! Library interface for the `shipgate` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for documentation generation and testing. The actual entry point is
//! in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                Log filter (e.g., debug, shipgate_core=trace)
    SHIPGATE_LOG_PATH       Explicit log file path
    SHIPGATE_LOG_DIR        Log directory
    GH_READ_ONLY_TOKEN      GitHub token for contributor queries (also GITHUB_TOKEN)
    TRAVIS_BRANCH           Branch being built
    TRAVIS_COMMIT_MESSAGE   Commit message of the build
    TRAVIS_PULL_REQUEST     Pull request number, or \"false\"
    SKIP_RELEASE            Any non-empty value suppresses the release
";

/// Command-line interface definition for shipgate.
#[derive(Parser)]
#[command(name = "shipgate")]
#[command(about = "Decide whether a CI build should release, and who built it", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the GitHub repository behind the git origin remote
    Origin(commands::origin::OriginArgs),

    /// Fetch or show the project's contributors
    #[command(subcommand)]
    Contributors(commands::contributors::ContributorsCommand),

    /// Decide whether this build should release
    ReleaseNeeded(commands::release_needed::ReleaseNeededArgs),

    /// Show package information
    Info(commands::info::InfoArgs),
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        command().debug_assert();
    }

    #[test]
    fn contributors_requires_subcommand() {
        assert!(Cli::try_parse_from(["shipgate", "contributors"]).is_err());
        assert!(Cli::try_parse_from(["shipgate", "contributors", "show"]).is_ok());
    }
}
