//! Shared in-memory doubles for driving the orchestrator without git,
//! docker, or the network.

// Not every test binary exercises every double.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use mender::application::Orchestrator;
use mender::domain::error::{AgentError, AgentResult};
use mender::domain::models::issue::{Issue, IssueStatus};
use mender::domain::models::job::RunRequest;
use mender::domain::ports::{
    CommitOutcome, PatchEngine, PipelineObserver, PipelineVerdict, ProjectProfile, RepoContext,
    RepositoryPreparer, RunnerKind, TestReport, TestRunner, VersionControl,
};
use mender::services::broadcaster::SnapshotBroadcaster;
use mender::services::registry::JobRegistry;

pub fn request() -> RunRequest {
    RunRequest {
        repository_url: "https://github.com/acme/widget".to_string(),
        team_name: "Acme".to_string(),
        leader_name: "Casey".to_string(),
        retry_limit: None,
    }
}

pub fn failing_report() -> TestReport {
    TestReport {
        passed: false,
        logs: "Error: expected 2 to equal 3\n    at widget.test.js:14".to_string(),
        runner: RunnerKind::Sandbox,
        tests_discovered: true,
    }
}

pub fn passing_report() -> TestReport {
    TestReport {
        passed: true,
        logs: "12 passing".to_string(),
        runner: RunnerKind::Sandbox,
        tests_discovered: true,
    }
}

pub fn undetected_report() -> TestReport {
    TestReport {
        passed: false,
        logs: "No supported test framework found".to_string(),
        runner: RunnerKind::None,
        tests_discovered: false,
    }
}

pub fn passing_verdict() -> PipelineVerdict {
    PipelineVerdict {
        passed: true,
        conclusion: Some("success".to_string()),
        workflow_name: Some("CI".to_string()),
        ..PipelineVerdict::default()
    }
}

pub fn failing_verdict() -> PipelineVerdict {
    PipelineVerdict {
        passed: false,
        conclusion: Some("failure".to_string()),
        workflow_name: Some("CI".to_string()),
        ..PipelineVerdict::default()
    }
}

/// Hands out a fixed branch name without touching the filesystem.
pub struct StubPreparer {
    pub branch: String,
}

#[async_trait]
impl RepositoryPreparer for StubPreparer {
    async fn prepare(&self, _request: &RunRequest, workdir: &Path) -> AgentResult<RepoContext> {
        Ok(RepoContext {
            repo_root: workdir.join("repo"),
            branch_name: self.branch.clone(),
        })
    }
}

/// Replays a queue of test reports; repeats the last queued report once the
/// queue is exhausted.
pub struct ScriptedRunner {
    reports: Mutex<VecDeque<TestReport>>,
    last: Mutex<TestReport>,
    pub runs: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(reports: impl IntoIterator<Item = TestReport>) -> Self {
        let queue: VecDeque<TestReport> = reports.into_iter().collect();
        let last = queue.back().cloned().unwrap_or_else(failing_report);
        Self {
            reports: Mutex::new(queue),
            last: Mutex::new(last),
            runs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn detect(&self, _workdir: &Path) -> AgentResult<ProjectProfile> {
        Ok(ProjectProfile {
            tests_discovered: true,
            image: "node:20-bullseye".to_string(),
            command: "npm test".to_string(),
            fallback_command: "npm test".to_string(),
        })
    }

    async fn run(&self, _workdir: &Path, _profile: &ProjectProfile) -> AgentResult<TestReport> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let next = self.reports.lock().unwrap().pop_front();
        match next {
            Some(report) => {
                *self.last.lock().unwrap() = report.clone();
                Ok(report)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Records git operations instead of running them.
pub struct MockVcs {
    /// Whether each commit attempt finds staged changes.
    pub commit_changes: bool,
    pub fail_push: bool,
    pub prepared_branches: Mutex<Vec<String>>,
    pub commits: AtomicUsize,
    pub pushes: AtomicUsize,
}

impl MockVcs {
    pub fn new(commit_changes: bool, fail_push: bool) -> Self {
        Self {
            commit_changes,
            fail_push,
            prepared_branches: Mutex::new(Vec::new()),
            commits: AtomicUsize::new(0),
            pushes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VersionControl for MockVcs {
    async fn clone_repo(&self, _url: &str, _dest: &Path) -> AgentResult<()> {
        Ok(())
    }

    async fn prepare_branch(&self, _repo: &Path, branch: &str) -> AgentResult<()> {
        self.prepared_branches.lock().unwrap().push(branch.to_string());
        Ok(())
    }

    async fn commit_fixes(&self, _repo: &Path, message_suffix: &str) -> AgentResult<CommitOutcome> {
        if self.commit_changes {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(CommitOutcome {
                committed: true,
                message: Some(format!("[AI-AGENT] {message_suffix}")),
            })
        } else {
            Ok(CommitOutcome::unchanged())
        }
    }

    async fn push_branch(&self, _repo: &Path, _branch: &str) -> AgentResult<()> {
        if self.fail_push {
            return Err(AgentError::Transport("remote rejected the push".to_string()));
        }
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_patch(&self, _repo: &Path, _patch: &str) -> AgentResult<bool> {
        Ok(true)
    }
}

/// Marks every issue with a fixed outcome.
pub struct FixedPatcher {
    pub fix: bool,
}

#[async_trait]
impl PatchEngine for FixedPatcher {
    async fn generate(&self, _repo: &Path, issues: Vec<Issue>) -> Vec<Issue> {
        issues
            .into_iter()
            .map(|mut issue| {
                issue.status = if self.fix {
                    IssueStatus::Fixed
                } else {
                    IssueStatus::Failed
                };
                issue
            })
            .collect()
    }
}

/// Replays a queue of pipeline verdicts; repeats the last one afterwards.
pub struct ScriptedPipeline {
    pub configured: bool,
    verdicts: Mutex<VecDeque<PipelineVerdict>>,
    last: Mutex<PipelineVerdict>,
    pub polls: AtomicUsize,
}

impl ScriptedPipeline {
    pub fn new(configured: bool, verdicts: impl IntoIterator<Item = PipelineVerdict>) -> Self {
        let queue: VecDeque<PipelineVerdict> = verdicts.into_iter().collect();
        let last = queue.back().cloned().unwrap_or_else(failing_verdict);
        Self {
            configured,
            verdicts: Mutex::new(queue),
            last: Mutex::new(last),
            polls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PipelineObserver for ScriptedPipeline {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn poll(&self, _repository_url: &str, _branch: &str) -> PipelineVerdict {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.verdicts.lock().unwrap().pop_front();
        match next {
            Some(verdict) => {
                *self.last.lock().unwrap() = verdict.clone();
                verdict
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

/// One fully-wired orchestrator with its collaborators exposed for
/// assertions. Keeps the temp workspace alive for the test's duration.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<JobRegistry>,
    pub vcs: Arc<MockVcs>,
    pub runner: Arc<ScriptedRunner>,
    pub pipeline: Arc<ScriptedPipeline>,
    pub workspace: TempDir,
}

pub fn harness(
    branch: &str,
    runner: ScriptedRunner,
    vcs: MockVcs,
    patcher: FixedPatcher,
    pipeline: ScriptedPipeline,
    default_retry_limit: u32,
) -> Harness {
    let workspace = TempDir::new().expect("temp workspace");
    let registry = Arc::new(JobRegistry::new());
    let broadcaster = Arc::new(SnapshotBroadcaster::new());
    let vcs = Arc::new(vcs);
    let runner = Arc::new(runner);
    let pipeline = Arc::new(pipeline);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        broadcaster,
        Arc::new(StubPreparer {
            branch: branch.to_string(),
        }),
        Arc::clone(&runner) as Arc<dyn TestRunner>,
        Arc::clone(&vcs) as Arc<dyn VersionControl>,
        Arc::new(patcher),
        Arc::clone(&pipeline) as Arc<dyn PipelineObserver>,
        workspace.path().to_path_buf(),
        default_retry_limit,
    ));

    Harness {
        orchestrator,
        registry,
        vcs,
        runner,
        pipeline,
        workspace,
    }
}
