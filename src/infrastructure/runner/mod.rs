//! Sandboxed test runner.
//!
//! Executes the project's test command inside a container with the working
//! directory mounted read-write. When the container runtime itself is
//! unusable (spawn failure or a docker-reserved exit code), execution falls
//! back to the host, and the report is tagged so observers can tell
//! sandboxed from unsandboxed runs apart.

pub mod detect;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::error::AgentResult;
use crate::domain::models::config::RunnerConfig;
use crate::domain::ports::{ProjectProfile, RunnerKind, TestReport, TestRunner};
use crate::infrastructure::process::{run_command, run_shell_with_timeout, CommandOutput};

/// Exit codes reserved by the docker CLI for its own failures (as opposed
/// to the containerized command failing): 125 daemon error, 126 not
/// executable, 127 not found.
const DOCKER_RESERVED_EXIT_CODES: [i32; 3] = [125, 126, 127];

/// Container-based test runner with host fallback.
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    docker_bin: String,
    test_timeout: Duration,
}

impl SandboxRunner {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            test_timeout: Duration::from_secs(config.test_timeout_secs),
        }
    }

    async fn run_in_sandbox(&self, workdir: &Path, profile: &ProjectProfile) -> CommandOutput {
        let volume = format!("{}:/workspace", workdir.display());
        let args = [
            "run",
            "--rm",
            "-v",
            &volume,
            "-w",
            "/workspace",
            &profile.image,
            "bash",
            "-lc",
            &profile.command,
        ];

        match tokio::time::timeout(
            self.test_timeout,
            run_command(&self.docker_bin, &args, workdir),
        )
        .await
        {
            Ok(output) => output,
            Err(_) => CommandOutput {
                code: 124,
                stdout: String::new(),
                stderr: format!(
                    "sandboxed test run timed out after {}s",
                    self.test_timeout.as_secs()
                ),
            },
        }
    }

    /// A docker failure that means the sandbox is unusable, not that the
    /// tests failed.
    fn sandbox_unavailable(output: &CommandOutput) -> bool {
        DOCKER_RESERVED_EXIT_CODES.contains(&output.code)
            || output.stderr.contains("failed to spawn")
    }
}

#[async_trait]
impl TestRunner for SandboxRunner {
    async fn detect(&self, workdir: &Path) -> AgentResult<ProjectProfile> {
        detect::detect_project(workdir).await
    }

    async fn run(&self, workdir: &Path, profile: &ProjectProfile) -> AgentResult<TestReport> {
        if !profile.tests_discovered {
            return Ok(TestReport {
                passed: false,
                logs: "No local test framework detected. Deferring to external CI for validation."
                    .to_string(),
                runner: RunnerKind::None,
                tests_discovered: false,
            });
        }

        let sandbox_output = self.run_in_sandbox(workdir, profile).await;

        if Self::sandbox_unavailable(&sandbox_output) {
            warn!(
                code = sandbox_output.code,
                "container runtime unavailable, falling back to local execution"
            );
            let local = run_shell_with_timeout(&profile.fallback_command, workdir, self.test_timeout).await;
            return Ok(TestReport {
                passed: local.success(),
                logs: format!("{}\n{}", sandbox_output.combined(), local.combined()),
                runner: RunnerKind::Local,
                tests_discovered: true,
            });
        }

        info!(code = sandbox_output.code, "sandboxed test run finished");
        Ok(TestReport {
            passed: sandbox_output.success(),
            logs: sandbox_output.combined(),
            runner: RunnerKind::Sandbox,
            tests_discovered: true,
        })
    }
}
