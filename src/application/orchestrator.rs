//! Job orchestrator: the fix-and-verify state machine.
//!
//! Owns per-job state for the process lifetime and drives the bounded
//! retry loop over the test runner, classifier, patch engine, git layer,
//! and pipeline observer. Every state transition appends a timeline entry
//! and pushes a snapshot to observers.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::{AgentError, AgentResult};
use crate::domain::models::config::Config;
use crate::domain::models::issue::{Issue, IssueStatus};
use crate::domain::models::job::{Job, JobStatus, RunRequest, Severity};
use crate::domain::models::score::ScoreBreakdown;
use crate::domain::models::snapshot::JobResult;
use crate::domain::ports::{
    PatchEngine, PipelineObserver, PipelineVerdict, RepoContext, RepositoryPreparer, TestRunner,
    VersionControl,
};
use crate::infrastructure::git::AI_AGENT_COMMIT_PREFIX;
use crate::infrastructure::github::ActionsClient;
use crate::infrastructure::llm::LlmClient;
use crate::infrastructure::runner::SandboxRunner;
use crate::infrastructure::GitCli;
use crate::services::broadcaster::{SnapshotBroadcaster, StreamEvent};
use crate::services::classifier;
use crate::services::patcher::PatchPipeline;
use crate::services::preparer::{is_valid_fix_branch_name, RepoPreparer};
use crate::services::registry::JobRegistry;

/// File name of the per-job result document.
const RESULT_FILE: &str = "results.json";

/// Commit-message marker recorded on issues whose fix attempt produced no
/// commit.
const NO_COMMIT: &str = "NO_COMMIT";

/// Outcome of one push-then-poll round.
enum Delivery {
    PipelinePassed(PipelineVerdict),
    PipelineFailed(PipelineVerdict),
    PushFailed(String),
}

/// Drives jobs from request to terminal state.
///
/// All mutable state (job registry, observer channels) is owned here and
/// passed by reference to request handlers; there is no ambient module
/// state.
pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    broadcaster: Arc<SnapshotBroadcaster>,
    preparer: Arc<dyn RepositoryPreparer>,
    runner: Arc<dyn TestRunner>,
    vcs: Arc<dyn VersionControl>,
    patcher: Arc<dyn PatchEngine>,
    pipeline: Arc<dyn PipelineObserver>,
    workspace_root: PathBuf,
    default_retry_limit: u32,
}

impl Orchestrator {
    /// Wire the orchestrator with explicit collaborators. Tests inject
    /// in-memory doubles here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<JobRegistry>,
        broadcaster: Arc<SnapshotBroadcaster>,
        preparer: Arc<dyn RepositoryPreparer>,
        runner: Arc<dyn TestRunner>,
        vcs: Arc<dyn VersionControl>,
        patcher: Arc<dyn PatchEngine>,
        pipeline: Arc<dyn PipelineObserver>,
        workspace_root: PathBuf,
        default_retry_limit: u32,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            preparer,
            runner,
            vcs,
            patcher,
            pipeline,
            workspace_root,
            default_retry_limit,
        }
    }

    /// Assemble the production wiring from config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(SnapshotBroadcaster::new());
        let vcs: Arc<dyn VersionControl> = Arc::new(GitCli::new());
        let llm = LlmClient::from_config(&config.llm)?.map(Arc::new);
        let patcher: Arc<dyn PatchEngine> =
            Arc::new(PatchPipeline::assemble(llm, Arc::clone(&vcs)));
        let pipeline: Arc<dyn PipelineObserver> = Arc::new(ActionsClient::new(&config.github)?);
        let preparer: Arc<dyn RepositoryPreparer> = Arc::new(RepoPreparer::new(
            Arc::clone(&vcs),
            config.github.token.clone(),
        ));
        let runner: Arc<dyn TestRunner> = Arc::new(SandboxRunner::new(&config.runner));

        Ok(Self::new(
            registry,
            broadcaster,
            preparer,
            runner,
            vcs,
            patcher,
            pipeline,
            PathBuf::from(&config.workspace.root),
            config.retry.default_limit,
        ))
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn broadcaster(&self) -> Arc<SnapshotBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Accept a run request: validate, allocate the job, and begin
    /// asynchronous execution. The job is registered before this returns
    /// so the stream endpoint can subscribe immediately.
    pub async fn start(self: &Arc<Self>, request: RunRequest) -> AgentResult<Uuid> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(AgentError::Configuration(format!(
                "{} are required",
                missing.join(", ")
            )));
        }

        let retry_limit = request.effective_retry_limit(self.default_retry_limit);
        let job = Job::new(&request, retry_limit);
        let job_id = job.id;
        self.registry.insert(job).await;
        self.broadcaster.register(job_id).await;

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_job(job_id, request).await;
        });

        Ok(job_id)
    }

    /// Synchronous variant of [`Orchestrator::start`] used by the one-shot
    /// CLI: registers the job and runs it to a terminal state.
    pub async fn run_to_completion(self: &Arc<Self>, request: RunRequest) -> AgentResult<Job> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(AgentError::Configuration(format!(
                "{} are required",
                missing.join(", ")
            )));
        }

        let retry_limit = request.effective_retry_limit(self.default_retry_limit);
        let job = Job::new(&request, retry_limit);
        let job_id = job.id;
        self.registry.insert(job).await;
        self.broadcaster.register(job_id).await;
        self.run_job(job_id, request).await;

        self.registry
            .get(job_id)
            .await
            .ok_or_else(|| AgentError::Execution("job vanished from registry".to_string()))
    }

    #[instrument(skip(self, request), fields(job_id = %job_id, repo = %request.repository_url))]
    async fn run_job(self: &Arc<Self>, job_id: Uuid, request: RunRequest) {
        if let Err(err) = self.execute(job_id, &request).await {
            let status = err.terminal_status();
            error!(%err, %status, "job terminated outside the retry loop");

            let message = err.to_string();
            if let Some(snapshot) = self
                .registry
                .update(job_id, |job| {
                    job.status = status;
                    job.error = Some(message.clone());
                    job.is_running = false;
                    job.log(0, Severity::Fail, format!("Execution failed: {message}"));
                })
                .await
            {
                self.broadcaster
                    .broadcast(job_id, StreamEvent::Snapshot(Box::new(snapshot)))
                    .await;
            }
            self.broadcaster
                .broadcast(job_id, StreamEvent::Error { error: message })
                .await;
        }
    }

    async fn execute(self: &Arc<Self>, job_id: Uuid, request: &RunRequest) -> AgentResult<()> {
        let workdir = self.workspace_root.join(job_id.to_string());
        let ctx = self.preparer.prepare(request, &workdir).await?;

        self.registry
            .update(job_id, |job| job.branch_name = ctx.branch_name.clone())
            .await;
        self.broadcast_snapshot(job_id).await;

        // Safety preconditions, checked before any git mutation.
        if !is_valid_fix_branch_name(&ctx.branch_name) {
            return Err(AgentError::PolicyViolation(format!(
                "branch '{}' does not match required TEAM_LEADER_AI_Fix format",
                ctx.branch_name
            )));
        }

        if !self.pipeline.is_configured() {
            return self.abort_unconfigured(job_id).await;
        }

        self.vcs.prepare_branch(&ctx.repo_root, &ctx.branch_name).await?;

        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or_else(|| AgentError::Execution("job vanished from registry".to_string()))?;
        let retry_limit = job.max_retries;

        let mut pass = false;
        let mut push_succeeded = false;
        let mut push_failed = false;
        let mut retry = 0;

        while retry < retry_limit && !pass {
            retry += 1;
            self.registry.update(job_id, |job| job.retries_used = retry).await;

            let profile = self.runner.detect(&ctx.repo_root).await?;
            let report = self.runner.run(&ctx.repo_root, &profile).await?;

            if !report.tests_discovered {
                // Cannot generate fixes without failing-test evidence, but
                // a push is still attempted so the external CI stays
                // authoritative.
                self.transition(job_id, JobStatus::VerifyingPipeline).await;
                self.log(
                    job_id,
                    retry,
                    Severity::Info,
                    "No local test framework detected. Relying on the external pipeline for validation.",
                )
                .await;

                match self.push_and_poll(job_id, retry, &job.repository, &ctx).await {
                    Delivery::PipelinePassed(verdict) => {
                        push_succeeded = true;
                        pass = true;
                        self.mark_pass(job_id, retry, &verdict).await;
                    }
                    Delivery::PipelineFailed(verdict) => {
                        push_succeeded = true;
                        let reason = verdict.describe_failure();
                        self.log(
                            job_id,
                            retry,
                            Severity::Fail,
                            format!("Pipeline failed: {reason}. Cannot auto-fix without local test framework."),
                        )
                        .await;

                        let mut issue = Issue::pipeline(format!(
                            "Pipeline failed: {reason}. No local test framework to generate fixes."
                        ));
                        issue.status = IssueStatus::Failed;
                        issue.record_outcome(NO_COMMIT);
                        self.registry
                            .update(job_id, |job| {
                                job.total_failures_detected += 1;
                                job.record_issues([issue]);
                            })
                            .await;
                        self.broadcast_snapshot(job_id).await;
                    }
                    Delivery::PushFailed(message) => {
                        push_failed = true;
                        self.halt_on_push_failure(job_id, retry, &message).await;
                        break;
                    }
                }
                continue;
            }

            let issues = if report.passed {
                self.transition(job_id, JobStatus::VerifyingPipeline).await;
                self.log(
                    job_id,
                    retry,
                    Severity::Pass,
                    format!(
                        "Local tests passed on retry {retry}. Runner: {}",
                        report.runner.as_str()
                    ),
                )
                .await;

                match self.push_and_poll(job_id, retry, &job.repository, &ctx).await {
                    Delivery::PipelinePassed(verdict) => {
                        push_succeeded = true;
                        pass = true;
                        self.mark_pass(job_id, retry, &verdict).await;
                        break;
                    }
                    Delivery::PushFailed(message) => {
                        push_failed = true;
                        self.halt_on_push_failure(job_id, retry, &message).await;
                        break;
                    }
                    Delivery::PipelineFailed(verdict) => {
                        push_succeeded = true;
                        let reason = verdict.describe_failure();
                        self.log(
                            job_id,
                            retry,
                            Severity::Fail,
                            format!("Pipeline failed: {reason}. Retrying..."),
                        )
                        .await;

                        // Re-run the suite to harvest fresh logs for the
                        // next classification round.
                        let fresh = self.runner.run(&ctx.repo_root, &profile).await?;
                        if fresh.tests_discovered && !fresh.passed {
                            classifier::classify(&fresh.logs)
                        } else {
                            vec![Issue::pipeline(format!("Pipeline failed: {reason}"))]
                        }
                    }
                }
            } else {
                self.transition(job_id, JobStatus::Retrying).await;
                classifier::classify(&report.logs)
            };

            self.generate_and_commit(job_id, retry, &ctx, issues).await?;
        }

        let final_status = if pass {
            JobStatus::Pass
        } else if push_failed {
            JobStatus::FailedPush
        } else if push_succeeded {
            JobStatus::FailedPipeline
        } else {
            JobStatus::FailedMaxRetries
        };

        let score = {
            let job = self
                .registry
                .get(job_id)
                .await
                .ok_or_else(|| AgentError::Execution("job vanished from registry".to_string()))?;
            ScoreBreakdown::compute(job.elapsed(), job.commit_count, pass, push_succeeded)
        };
        self.finalize(job_id, final_status, score).await
    }

    /// Generate patches for the classified issues, commit whatever changed,
    /// and fold outcomes into the job.
    async fn generate_and_commit(
        &self,
        job_id: Uuid,
        retry: u32,
        ctx: &RepoContext,
        issues: Vec<Issue>,
    ) -> AgentResult<()> {
        let detected = issues.len() as u64;
        self.registry
            .update(job_id, |job| job.total_failures_detected += detected)
            .await;

        let mut outcomes = self.patcher.generate(&ctx.repo_root, issues).await;
        let fixed = outcomes
            .iter()
            .filter(|issue| issue.status == IssueStatus::Fixed)
            .count() as u64;

        let commit = self
            .vcs
            .commit_fixes(&ctx.repo_root, &format!("Retry {retry} automated fixes"))
            .await?;
        let commit_message = commit
            .message
            .clone()
            .unwrap_or_else(|| NO_COMMIT.to_string());
        for issue in &mut outcomes {
            issue.record_outcome(&commit_message);
        }

        self.registry
            .update(job_id, |job| {
                job.total_fixes_applied += fixed;
                if commit.committed {
                    job.commit_count += 1;
                }
                job.record_issues(outcomes);
            })
            .await;

        let message = if commit.committed {
            format!("Retry {retry}: {fixed} fixes applied and committed.")
        } else {
            format!("Retry {retry}: no commit generated (no file changes).")
        };
        self.log(job_id, retry, Severity::Fail, message).await;
        Ok(())
    }

    /// Push the fix branch and poll the external pipeline. Push failures
    /// are reported, never retried: pushing is assumed deterministic.
    async fn push_and_poll(
        &self,
        job_id: Uuid,
        retry: u32,
        repository: &str,
        ctx: &RepoContext,
    ) -> Delivery {
        match self.vcs.push_branch(&ctx.repo_root, &ctx.branch_name).await {
            Ok(()) => {
                self.log(
                    job_id,
                    retry,
                    Severity::Pass,
                    format!("Branch pushed: {}", ctx.branch_name),
                )
                .await;

                let verdict = self.pipeline.poll(repository, &ctx.branch_name).await;
                if verdict.passed {
                    Delivery::PipelinePassed(verdict)
                } else {
                    Delivery::PipelineFailed(verdict)
                }
            }
            Err(err) => Delivery::PushFailed(err.to_string()),
        }
    }

    async fn mark_pass(&self, job_id: Uuid, retry: u32, verdict: &PipelineVerdict) {
        let workflow = verdict
            .workflow_name
            .clone()
            .unwrap_or_else(|| "CI/CD".to_string());
        self.transition(job_id, JobStatus::Pass).await;
        self.log(job_id, retry, Severity::Pass, format!("Pipeline passed: {workflow}"))
            .await;
    }

    async fn halt_on_push_failure(&self, job_id: Uuid, retry: u32, message: &str) {
        warn!(%message, "push failed, halting retry loop");
        self.transition(job_id, JobStatus::FailedPush).await;
        self.log(
            job_id,
            retry,
            Severity::Fail,
            format!("Push error: {message}. Stopping execution."),
        )
        .await;
    }

    /// Terminal path for a job that cannot observe its pipeline. Consumes
    /// zero retries.
    async fn abort_unconfigured(&self, job_id: Uuid) -> AgentResult<()> {
        self.transition(job_id, JobStatus::ConfigurationError).await;
        self.log(
            job_id,
            0,
            Severity::Fail,
            "GitHub token not configured. Cannot verify the external pipeline.",
        )
        .await;
        // The retry loop never ran; the score stays zeroed.
        self.finalize(job_id, JobStatus::ConfigurationError, ScoreBreakdown::zero())
            .await
    }

    /// Record the final score, persist the result document, and emit the
    /// terminal events.
    async fn finalize(&self, job_id: Uuid, status: JobStatus, score: ScoreBreakdown) -> AgentResult<()> {
        let snapshot = self
            .registry
            .update(job_id, |job| {
                job.status = status;
                job.score = score;
                job.is_running = false;
            })
            .await;

        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or_else(|| AgentError::Execution("job vanished from registry".to_string()))?;
        let result = JobResult::of(&job, AI_AGENT_COMMIT_PREFIX);

        self.write_result(job_id, &result).await?;

        if let Some(snapshot) = snapshot {
            self.broadcaster
                .broadcast(job_id, StreamEvent::Snapshot(Box::new(snapshot)))
                .await;
        }
        self.broadcaster
            .broadcast(job_id, StreamEvent::Done(Box::new(result)))
            .await;

        info!(%status, "job finished");
        Ok(())
    }

    async fn write_result(&self, job_id: Uuid, result: &JobResult) -> AgentResult<()> {
        let workdir = self.workspace_root.join(job_id.to_string());
        tokio::fs::create_dir_all(&workdir).await?;
        let path = workdir.join(RESULT_FILE);
        let body = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn transition(&self, job_id: Uuid, status: JobStatus) {
        self.registry.update(job_id, |job| job.status = status).await;
        self.broadcast_snapshot(job_id).await;
    }

    async fn log(&self, job_id: Uuid, retry: u32, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        self.registry
            .update(job_id, |job| job.log(retry, severity, message))
            .await;
        self.broadcast_snapshot(job_id).await;
    }

    async fn broadcast_snapshot(&self, job_id: Uuid) {
        if let Some(snapshot) = self.registry.snapshot(job_id).await {
            self.broadcaster
                .broadcast(job_id, StreamEvent::Snapshot(Box::new(snapshot)))
                .await;
        }
    }
}
