//! Captured-output command execution.
//!
//! Thin wrapper over `tokio::process` used by the git layer, the sandbox
//! runner, and the heuristic fix strategies. Spawn failures are folded into
//! the output (exit code 1) so callers uniformly branch on the code.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Captured result of one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Combined stdout/stderr, stdout first.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    fn spawn_failure(message: String) -> Self {
        Self {
            code: 1,
            stdout: String::new(),
            stderr: message,
        }
    }
}

/// Run a program with arguments in `cwd`, capturing output.
pub async fn run_command(program: &str, args: &[&str], cwd: &Path) -> CommandOutput {
    debug!(program, ?args, cwd = %cwd.display(), "running command");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) => CommandOutput {
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(err) => CommandOutput::spawn_failure(format!("failed to spawn {program}: {err}")),
    }
}

/// Run a composite shell command (`sh -c`) in `cwd`.
pub async fn run_shell(command: &str, cwd: &Path) -> CommandOutput {
    run_command("sh", &["-c", command], cwd).await
}

/// Run a composite shell command with a hard timeout. A timed-out command
/// reports exit code 124 with the elapsed ceiling named in stderr.
pub async fn run_shell_with_timeout(command: &str, cwd: &Path, ceiling: Duration) -> CommandOutput {
    match tokio::time::timeout(ceiling, run_shell(command, cwd)).await {
        Ok(output) => output,
        Err(_) => CommandOutput {
            code: 124,
            stdout: String::new(),
            stderr: format!("command timed out after {}s: {command}", ceiling.as_secs()),
        },
    }
}
