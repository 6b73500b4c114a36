//! Git safety layer.
//!
//! Wraps the git CLI behind [`VersionControl`] and enforces branch/commit
//! policy: no operation ever targets a protected branch, and every commit
//! carries the agent provenance prefix. Policy checks run before any
//! repository state is mutated.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::error::{AgentError, AgentResult};
use crate::domain::ports::{CommitOutcome, VersionControl};
use crate::infrastructure::process::run_command;

/// Provenance tag every agent commit message starts with.
pub const AI_AGENT_COMMIT_PREFIX: &str = "[AI-AGENT]";

/// Branches the agent must never create or push to.
const PROTECTED_BRANCHES: [&str; 2] = ["main", "master"];

/// Temp file name for patch application, removed on both outcome paths.
const PATCH_FILE: &str = ".ai-fix.patch";

/// Reject empty or protected branch names, case-insensitively. Evaluated
/// before any git invocation so a rejected request has no side effect.
pub fn assert_safe_target_branch(branch: &str) -> AgentResult<()> {
    let normalized = branch.trim().to_lowercase();
    if normalized.is_empty() || PROTECTED_BRANCHES.contains(&normalized.as_str()) {
        return Err(AgentError::PolicyViolation(format!(
            "pushing to protected branch '{branch}' is not allowed"
        )));
    }
    Ok(())
}

/// Git CLI implementation of the version control port.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    async fn git(&self, repo: &Path, args: &[&str]) -> AgentResult<String> {
        let output = run_command("git", args, repo).await;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(AgentError::Transport(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                output.stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> AgentResult<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;
        let dest_str = dest.to_string_lossy();
        info!(dest = %dest_str, "cloning repository");
        self.git(parent, &["clone", url, &dest_str]).await?;
        Ok(())
    }

    async fn prepare_branch(&self, repo: &Path, branch: &str) -> AgentResult<()> {
        assert_safe_target_branch(branch)?;
        debug!(branch, "creating fix branch");
        self.git(repo, &["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn commit_fixes(&self, repo: &Path, message_suffix: &str) -> AgentResult<CommitOutcome> {
        let status = self.git(repo, &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            debug!("working tree clean, nothing to commit");
            return Ok(CommitOutcome::unchanged());
        }

        self.git(repo, &["add", "-A"]).await?;

        let message = format!("{AI_AGENT_COMMIT_PREFIX} {message_suffix}");
        // Every commit message must begin with the provenance tag.
        if !message.starts_with(AI_AGENT_COMMIT_PREFIX) {
            return Err(AgentError::PolicyViolation(format!(
                "commit message must start with {AI_AGENT_COMMIT_PREFIX}"
            )));
        }
        self.git(repo, &["commit", "-m", &message]).await?;

        Ok(CommitOutcome {
            committed: true,
            message: Some(message),
        })
    }

    async fn push_branch(&self, repo: &Path, branch: &str) -> AgentResult<()> {
        assert_safe_target_branch(branch)?;
        info!(branch, "pushing fix branch");
        self.git(repo, &["push", "-u", "origin", branch]).await?;
        Ok(())
    }

    async fn apply_patch(&self, repo: &Path, patch: &str) -> AgentResult<bool> {
        let patch_path = repo.join(PATCH_FILE);
        tokio::fs::write(&patch_path, patch).await?;

        let result = run_command("git", &["apply", PATCH_FILE], repo).await;
        if !result.success() {
            warn!(stderr = %result.stderr.trim(), "patch did not apply cleanly");
        }

        // Remove the temp file on both success and failure paths.
        if let Err(err) = tokio::fs::remove_file(&patch_path).await {
            warn!(%err, "failed to remove temporary patch file");
        }

        Ok(result.success())
    }
}
