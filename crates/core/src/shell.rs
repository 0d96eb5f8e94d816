//! Shell command execution behind a testable trait

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// A failed command invocation carrying its captured output
#[derive(Debug, Error)]
#[error("command `{command}` failed ({status}): {detail}")]
pub struct CommandError {
    /// The command line that was run
    pub command: String,
    /// Exit status description
    pub status: String,
    /// Captured output, newline-joined
    pub detail: String,
}

/// Runs external commands and captures their output
///
/// The engine only ever needs "run this command line, give me the ordered
/// output lines or a failure", so backends stay testable with scripted
/// fakes.
pub trait CommandRunner {
    /// Execute a command line, returning captured stdout then stderr lines
    fn run(&self, command: &str) -> Result<Vec<String>, CommandError>;
}

/// `CommandRunner` backed by `/bin/sh -c`
#[derive(Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<Vec<String>, CommandError> {
        info!("running command: {}", command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command.trim())
            .output()
            .map_err(|e| CommandError {
                command: command.to_string(),
                status: "spawn failed".to_string(),
                detail: e.to_string(),
            })?;

        let mut lines: Vec<String> = Vec::new();
        for stream in [&output.stdout, &output.stderr] {
            lines.extend(
                String::from_utf8_lossy(stream)
                    .lines()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty()),
            );
        }

        for line in &lines {
            debug!("command output: {}", line);
        }

        if output.status.success() {
            Ok(lines)
        } else {
            Err(CommandError {
                command: command.to_string(),
                status: output.status.to_string(),
                detail: lines.join("\n"),
            })
        }
    }
}
