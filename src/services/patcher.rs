//! Patch generation pipeline.
//!
//! For each issue, strategies are tried in order until one reports success:
//! an LLM-authored unified diff first (when a credential is configured),
//! then deterministic category-specific repairs. Each issue's attempt is
//! isolated; a strategy error marks that issue FAILED and the batch moves
//! on.

use std::path::Path;
use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::domain::error::{AgentError, AgentResult};
use crate::domain::models::issue::{Issue, IssueCategory, IssueStatus};
use crate::domain::ports::{FixContext, FixStrategy, PatchEngine, VersionControl};
use crate::infrastructure::llm::{strip_code_fences, LlmClient};
use crate::infrastructure::process::run_shell;

/// Cap on file content included in a patch prompt.
const MAX_PROMPT_FILE_BYTES: usize = 24 * 1024;

static QUOTED_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("valid regex"));

/// Requests a unified diff from the LLM and applies it with the VCS
/// patch-apply primitive.
pub struct LlmPatchStrategy {
    llm: Arc<LlmClient>,
    vcs: Arc<dyn VersionControl>,
}

impl LlmPatchStrategy {
    pub fn new(llm: Arc<LlmClient>, vcs: Arc<dyn VersionControl>) -> Self {
        Self { llm, vcs }
    }

    async fn build_prompt(&self, ctx: &FixContext<'_>) -> String {
        let mut file_content = String::new();
        if ctx.issue.has_real_path() {
            if let Ok(content) = tokio::fs::read_to_string(ctx.repo_root.join(&ctx.issue.file)).await {
                file_content = content;
                file_content.truncate(MAX_PROMPT_FILE_BYTES);
            }
        }

        format!(
            "You are fixing CI failures.\n\
             Bug type: {}\n\
             Bug detail: {}\n\
             Return only a valid unified diff patch for git apply.\n\
             Do not include explanations.\n\n\
             Current file content:\n{file_content}",
            ctx.issue.category, ctx.issue.detail
        )
    }
}

#[async_trait]
impl FixStrategy for LlmPatchStrategy {
    fn name(&self) -> &'static str {
        "llm-patch"
    }

    async fn attempt(&self, ctx: &FixContext<'_>) -> AgentResult<bool> {
        let prompt = self.build_prompt(ctx).await;
        let response = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|err| AgentError::Patch(err.to_string()))?;

        let patch = strip_code_fences(&response);
        if patch.is_empty() {
            return Ok(false);
        }

        self.vcs.apply_patch(ctx.repo_root, &patch).await
    }
}

/// Deterministic category-specific repairs: lint autofix for
/// LINTING/INDENTATION, dependency install for IMPORT. Other categories
/// have no fallback.
#[derive(Debug, Default)]
pub struct HeuristicFixStrategy;

impl HeuristicFixStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Module name quoted inside the issue detail, when it is an
    /// installable package rather than a relative path.
    fn installable_module(detail: &str) -> Option<&str> {
        let captures = QUOTED_MODULE.captures(detail)?;
        let module = captures.get(1)?.as_str();
        if module.starts_with('.') || module.starts_with('/') {
            return None;
        }
        Some(module)
    }
}

#[async_trait]
impl FixStrategy for HeuristicFixStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn attempt(&self, ctx: &FixContext<'_>) -> AgentResult<bool> {
        match ctx.issue.category {
            IssueCategory::Linting | IssueCategory::Indentation => {
                let output = run_shell("npm run lint -- --fix", ctx.repo_root).await;
                Ok(output.success())
            }
            IssueCategory::Import => {
                let Some(module) = Self::installable_module(&ctx.issue.detail) else {
                    return Ok(false);
                };
                debug!(module, "installing missing dependency");
                let output = run_shell(&format!("npm install {module}"), ctx.repo_root).await;
                Ok(output.success())
            }
            _ => Ok(false),
        }
    }
}

/// Ordered fallback chain over [`FixStrategy`] implementations.
pub struct PatchPipeline {
    strategies: Vec<Arc<dyn FixStrategy>>,
}

impl PatchPipeline {
    pub fn new(strategies: Vec<Arc<dyn FixStrategy>>) -> Self {
        Self { strategies }
    }

    /// Assemble the production chain: LLM first when configured, then the
    /// deterministic heuristics.
    pub fn assemble(llm: Option<Arc<LlmClient>>, vcs: Arc<dyn VersionControl>) -> Self {
        let mut strategies: Vec<Arc<dyn FixStrategy>> = Vec::new();
        if let Some(llm) = llm {
            strategies.push(Arc::new(LlmPatchStrategy::new(llm, vcs)));
        }
        strategies.push(Arc::new(HeuristicFixStrategy::new()));
        Self::new(strategies)
    }

    async fn attempt_issue(&self, repo: &Path, issue: &Issue) -> bool {
        let ctx = FixContext {
            repo_root: repo,
            issue,
        };
        for strategy in &self.strategies {
            match strategy.attempt(&ctx).await {
                Ok(true) => {
                    info!(strategy = strategy.name(), file = %issue.file, "fix applied");
                    return true;
                }
                Ok(false) => {
                    debug!(strategy = strategy.name(), file = %issue.file, "strategy declined");
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), file = %issue.file, %err, "strategy failed");
                }
            }
        }
        false
    }
}

#[async_trait]
impl PatchEngine for PatchPipeline {
    async fn generate(&self, repo: &Path, issues: Vec<Issue>) -> Vec<Issue> {
        let mut outcomes = Vec::with_capacity(issues.len());
        for mut issue in issues {
            let fixed = self.attempt_issue(repo, &issue).await;
            issue.status = if fixed { IssueStatus::Fixed } else { IssueStatus::Failed };
            outcomes.push(issue);
        }
        outcomes
    }
}
