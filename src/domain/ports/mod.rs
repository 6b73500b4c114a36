//! Ports: capability interfaces the orchestrator drives.
//!
//! Each unreliable external collaborator (container runtime, VCS, LLM
//! service, third-party CI) sits behind one of these traits so the retry
//! engine can be exercised against in-memory doubles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::AgentResult;
use super::models::issue::Issue;
use super::models::job::RunRequest;

/// Which runtime actually executed the test command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Inside the container sandbox.
    Sandbox,
    /// Direct host execution after the sandbox was unavailable.
    Local,
    /// No supported test framework; nothing was executed.
    None,
}

impl RunnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Local => "local",
            Self::None => "none",
        }
    }
}

/// Execution profile derived from a repository's marker files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectProfile {
    /// False when no recognized project shape was found. The command then
    /// always fails, signaling "defer to external CI".
    pub tests_discovered: bool,
    /// Container image reference for sandboxed execution.
    pub image: String,
    /// Composite shell command run inside the sandbox.
    pub command: String,
    /// Locally-executable fallback command.
    pub fallback_command: String,
}

/// Outcome of one test run.
#[derive(Debug, Clone)]
pub struct TestReport {
    /// True only if the command exited zero AND a test framework was
    /// actually discovered. A vacuous success on an undetected project is
    /// never reported as passing.
    pub passed: bool,
    /// Combined stdout/stderr of the run.
    pub logs: String,
    pub runner: RunnerKind,
    pub tests_discovered: bool,
}

/// Executes the project's test suite in an isolated runtime.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Inspect marker files and derive an execution profile.
    async fn detect(&self, workdir: &Path) -> AgentResult<ProjectProfile>;

    /// Run the profile's command, falling back to local execution if the
    /// sandbox is unavailable.
    async fn run(&self, workdir: &Path, profile: &ProjectProfile) -> AgentResult<TestReport>;
}

/// Result of a commit attempt.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub committed: bool,
    /// Full commit message, present when a commit was created.
    pub message: Option<String>,
}

impl CommitOutcome {
    /// A clean working tree: nothing to commit.
    pub fn unchanged() -> Self {
        Self {
            committed: false,
            message: None,
        }
    }
}

/// Policy-enforcing version control operations.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn clone_repo(&self, url: &str, dest: &Path) -> AgentResult<()>;

    /// Create and check out the fix branch. Raises a policy violation for
    /// protected branch names before any repository state is mutated.
    async fn prepare_branch(&self, repo: &Path, branch: &str) -> AgentResult<()>;

    /// Stage and commit all changes under the provenance prefix. No-ops on
    /// a clean tree.
    async fn commit_fixes(&self, repo: &Path, message_suffix: &str) -> AgentResult<CommitOutcome>;

    /// Push the fix branch upstream with tracking. Re-applies the
    /// protected-branch check.
    async fn push_branch(&self, repo: &Path, branch: &str) -> AgentResult<()>;

    /// Apply a unified diff to the working tree. `Ok(false)` means the
    /// patch did not apply cleanly.
    async fn apply_patch(&self, repo: &Path, patch: &str) -> AgentResult<bool>;
}

/// Verdict from polling the external CI system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineVerdict {
    pub passed: bool,
    /// Completed run's conclusion, when one was observed.
    pub conclusion: Option<String>,
    /// Human-readable failure reason when no conclusion exists.
    pub reason: Option<String>,
    pub workflow_name: Option<String>,
    /// Absence of observability, distinct from failure.
    pub configuration_error: bool,
    pub timed_out: bool,
}

impl PipelineVerdict {
    /// Failure description for timelines and synthetic issues.
    pub fn describe_failure(&self) -> String {
        self.reason
            .clone()
            .or_else(|| self.conclusion.clone())
            .unwrap_or_else(|| "Pipeline failed".to_string())
    }
}

/// Observes the external CI pipeline for a pushed branch.
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    /// Whether a CI credential is configured. Checked before the retry
    /// loop: the agent cannot claim a pipeline passed without being able
    /// to observe it.
    fn is_configured(&self) -> bool;

    /// Poll until the latest run for `branch` completes or the poll budget
    /// is exhausted. Never raises; failures are encoded in the verdict.
    async fn poll(&self, repository_url: &str, branch: &str) -> PipelineVerdict;
}

/// Everything a fix strategy needs to attempt one repair.
#[derive(Debug, Clone, Copy)]
pub struct FixContext<'a> {
    pub repo_root: &'a Path,
    pub issue: &'a Issue,
}

/// One rung of the patch-generation fallback chain. Strategies are tried
/// in order until one succeeds or the chain is exhausted.
#[async_trait]
pub trait FixStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Attempt a repair. `Ok(true)` means the working tree was changed and
    /// the issue is considered fixed.
    async fn attempt(&self, ctx: &FixContext<'_>) -> AgentResult<bool>;
}

/// Generates and applies patches for a batch of issues.
#[async_trait]
pub trait PatchEngine: Send + Sync {
    /// One outcome per issue, independent of input order, never raising:
    /// each issue's attempt is isolated so one failure cannot abort the
    /// batch. Returned issues carry FIXED or FAILED statuses.
    async fn generate(&self, repo: &Path, issues: Vec<Issue>) -> Vec<Issue>;
}

/// Prepared working copy for one job.
#[derive(Debug, Clone)]
pub struct RepoContext {
    pub repo_root: PathBuf,
    /// Derived policy-compliant fix branch name.
    pub branch_name: String,
}

/// Clones the target repository and derives the fix branch.
#[async_trait]
pub trait RepositoryPreparer: Send + Sync {
    async fn prepare(&self, request: &RunRequest, workdir: &Path) -> AgentResult<RepoContext>;
}
