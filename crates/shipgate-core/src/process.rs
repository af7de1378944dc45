//! External process boundary.
//!
//! The core never spawns processes directly; it goes through a
//! [`ProcessRunner`] so callers and tests can substitute their own.

use std::process::Command;

use camino::Utf8Path;
use tracing::{debug, instrument};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code, or `-1` if the process was terminated by a signal.
    pub exit_code: i32,
    /// Captured stdout, lossily decoded as UTF-8.
    pub stdout: String,
    /// Captured stderr, lossily decoded as UTF-8.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code zero.
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command to completion and captures its output.
///
/// `command[0]` is the program; the rest are its arguments. An `Err` means
/// the process could not be started at all. A non-zero exit is reported
/// through [`ProcessOutput::exit_code`], not as an error.
pub trait ProcessRunner {
    /// Run `command` inside `working_dir`.
    fn run(&self, command: &[&str], working_dir: &Utf8Path) -> std::io::Result<ProcessOutput>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, command: &[&str], working_dir: &Utf8Path) -> std::io::Result<ProcessOutput> {
        (**self).run(command, working_dir)
    }
}

/// [`ProcessRunner`] backed by [`std::process::Command`].
///
/// Inherits the environment of the current process, so `git` sees the
/// user's configuration, credentials helpers and SSH keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    #[instrument(skip(self), fields(dir = %working_dir))]
    fn run(&self, command: &[&str], working_dir: &Utf8Path) -> std::io::Result<ProcessOutput> {
        let (program, args) = command.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
        })?;

        let output = Command::new(program)
            .args(args)
            .current_dir(working_dir.as_std_path())
            .output()?;

        let result = ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(exit_code = result.exit_code, "process finished");
        Ok(result)
    }
}
