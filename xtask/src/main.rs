//! Packaging tasks for the `shipgate` binary.
//!
//! - `man` writes `shipgate.1`, one page per subcommand
//!   (`shipgate-release-needed.1`), and one per nested subcommand
//!   (`shipgate-contributors-fetch.1`) to `dist/share/man/man1`.
//! - `completions` writes bash, zsh, fish and PowerShell scripts (or only
//!   the one named by `--shell`) to `dist/share/completions`.
//!
//! Both resolve `--out-dir` against the workspace root.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "xtask")]
#[command(about = "Project maintenance tasks")]
struct Xtask {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Generate shell completions for the shipgate CLI.
    Completions(commands::completions::CompletionsArgs),

    /// Generate manpages for the shipgate CLI.
    Man(commands::man::ManArgs),
}

fn main() -> Result<(), String> {
    let task = Xtask::parse();
    match task.command {
        Task::Completions(args) => commands::completions::cmd_completions(args),
        Task::Man(args) => commands::man::cmd_man(args),
    }
}

/// The workspace root, one level above this crate.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(&manifest_dir).to_path_buf()
}
