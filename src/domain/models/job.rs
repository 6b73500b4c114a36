//! Job domain model.
//!
//! A job is one end-to-end automated fix-and-verify run against a
//! repository. Jobs live in the in-process registry for the lifetime of the
//! process; the only persisted artifact is the final result document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::issue::Issue;
use super::score::ScoreBreakdown;

/// Upper bound on the job's accumulated issue list. Older entries are
/// truncated from the head when exceeded.
pub const MAX_TRACKED_ISSUES: usize = 100;

/// Retry budget bounds and default.
pub const MIN_RETRY_LIMIT: u32 = 1;
pub const MAX_RETRY_LIMIT: u32 = 10;
pub const DEFAULT_RETRY_LIMIT: u32 = 5;

/// Status of a job in the fix-and-verify state machine.
///
/// All states are terminal except `Starting`, `Retrying`, and
/// `VerifyingPipeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job accepted, repository preparation in progress.
    Starting,
    /// Local tests failed; classifying and patching.
    Retrying,
    /// Local tests passed (or deferred); awaiting external CI verdict.
    VerifyingPipeline,
    /// External pipeline passed on the pushed branch.
    Pass,
    /// Branch was pushed but the pipeline never passed within budget.
    FailedPipeline,
    /// Push failed; halted without exhausting the budget.
    FailedPush,
    /// Retry budget exhausted without a successful push.
    FailedMaxRetries,
    /// Required credential missing; aborted before the retry loop.
    ConfigurationError,
    /// Branch or commit policy violated; aborted before any git mutation.
    PolicyViolation,
    /// Unexpected failure outside the taxonomy above.
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Retrying => "RETRYING",
            Self::VerifyingPipeline => "VERIFYING_PIPELINE",
            Self::Pass => "PASS",
            Self::FailedPipeline => "FAILED_PIPELINE",
            Self::FailedPush => "FAILED_PUSH",
            Self::FailedMaxRetries => "FAILED_MAX_RETRIES",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::PolicyViolation => "POLICY_VIOLATION",
            Self::Error => "ERROR",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Starting | Self::Retrying | Self::VerifyingPipeline)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity tag for a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Pass,
    Fail,
    Info,
}

/// Immutable, append-only timeline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimelineEntry {
    /// Retry index this entry was recorded on (0 for pre-loop events).
    pub retry: u32,
    /// Retry ceiling at the time of recording.
    pub max_retries: u32,
    pub severity: Severity,
    pub message: String,
    /// Wall-clock label, `HH:MM:SS`.
    pub time: String,
}

impl TimelineEntry {
    pub fn new(retry: u32, max_retries: u32, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            retry,
            max_retries,
            severity,
            message: message.into(),
            time: Utc::now().format("%H:%M:%S").to_string(),
        }
    }
}

/// Request to start a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Blank-tolerant so the handler can report every missing field by its
    /// wire name instead of failing on the first deserialization error.
    #[serde(default)]
    pub repository_url: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub leader_name: String,
    #[serde(default)]
    pub retry_limit: Option<u32>,
}

impl RunRequest {
    /// Names of required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.repository_url.trim().is_empty() {
            missing.push("repositoryUrl");
        }
        if self.team_name.trim().is_empty() {
            missing.push("teamName");
        }
        if self.leader_name.trim().is_empty() {
            missing.push("leaderName");
        }
        missing
    }

    /// Retry budget clamped to `[MIN_RETRY_LIMIT, MAX_RETRY_LIMIT]`.
    pub fn effective_retry_limit(&self, default_limit: u32) -> u32 {
        self.retry_limit
            .unwrap_or(default_limit)
            .clamp(MIN_RETRY_LIMIT, MAX_RETRY_LIMIT)
    }
}

/// One end-to-end fix-and-verify run. Owned exclusively by the orchestrator
/// for its lifetime; observers see read-only snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Job {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub is_running: bool,
    pub status: JobStatus,
    /// Human-readable terminal error, when the job died outside the loop.
    pub error: Option<String>,
    pub repository: String,
    pub team_name: String,
    pub leader_name: String,
    /// Derived fix branch; set during repository preparation.
    pub branch_name: String,
    pub max_retries: u32,
    pub retries_used: u32,
    pub total_failures_detected: u64,
    pub total_fixes_applied: u64,
    pub commit_count: u32,
    /// Accumulated issues, bounded to the last [`MAX_TRACKED_ISSUES`].
    pub issues: Vec<Issue>,
    pub timeline: Vec<TimelineEntry>,
    pub score: ScoreBreakdown,
}

impl Job {
    pub fn new(request: &RunRequest, retry_limit: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            is_running: true,
            status: JobStatus::Starting,
            error: None,
            repository: request.repository_url.clone(),
            team_name: request.team_name.clone(),
            leader_name: request.leader_name.clone(),
            branch_name: String::new(),
            max_retries: retry_limit,
            retries_used: 0,
            total_failures_detected: 0,
            total_fixes_applied: 0,
            commit_count: 0,
            issues: Vec::new(),
            timeline: Vec::new(),
            score: ScoreBreakdown::zero(),
        }
    }

    /// Append issues, truncating from the head to honor the bound.
    pub fn record_issues(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
        if self.issues.len() > MAX_TRACKED_ISSUES {
            let excess = self.issues.len() - MAX_TRACKED_ISSUES;
            self.issues.drain(..excess);
        }
    }

    pub fn log(&mut self, retry: u32, severity: Severity, message: impl Into<String>) {
        self.timeline
            .push(TimelineEntry::new(retry, self.max_retries, severity, message));
    }

    /// Wall-clock time since the job started.
    pub fn elapsed(&self) -> std::time::Duration {
        (Utc::now() - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::issue::IssueCategory;

    fn request() -> RunRequest {
        RunRequest {
            repository_url: "https://github.com/acme/widget".to_string(),
            team_name: "Acme".to_string(),
            leader_name: "Casey".to_string(),
            retry_limit: None,
        }
    }

    #[test]
    fn retry_limit_clamps_to_bounds() {
        let mut req = request();
        assert_eq!(req.effective_retry_limit(DEFAULT_RETRY_LIMIT), 5);

        req.retry_limit = Some(0);
        assert_eq!(req.effective_retry_limit(DEFAULT_RETRY_LIMIT), 1);

        req.retry_limit = Some(99);
        assert_eq!(req.effective_retry_limit(DEFAULT_RETRY_LIMIT), 10);

        req.retry_limit = Some(7);
        assert_eq!(req.effective_retry_limit(DEFAULT_RETRY_LIMIT), 7);
    }

    #[test]
    fn missing_fields_reported_by_wire_name() {
        let req = RunRequest {
            repository_url: String::new(),
            team_name: " ".to_string(),
            leader_name: "Casey".to_string(),
            retry_limit: None,
        };
        assert_eq!(req.missing_fields(), vec!["repositoryUrl", "teamName"]);
        assert!(request().missing_fields().is_empty());
    }

    #[test]
    fn issue_list_is_bounded_to_last_hundred() {
        let mut job = Job::new(&request(), 5);
        let issues: Vec<Issue> = (0..130)
            .map(|i| Issue::new("unknown", None, IssueCategory::Logic, format!("issue {i}")))
            .collect();
        job.record_issues(issues);

        assert_eq!(job.issues.len(), MAX_TRACKED_ISSUES);
        // The oldest entries were truncated from the head.
        assert_eq!(job.issues[0].detail, "issue 30");
        assert_eq!(job.issues.last().unwrap().detail, "issue 129");
    }

    #[test]
    fn only_intermediate_states_are_non_terminal() {
        for status in [JobStatus::Starting, JobStatus::Retrying, JobStatus::VerifyingPipeline] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
        for status in [
            JobStatus::Pass,
            JobStatus::FailedPipeline,
            JobStatus::FailedPush,
            JobStatus::FailedMaxRetries,
            JobStatus::ConfigurationError,
            JobStatus::PolicyViolation,
            JobStatus::Error,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&JobStatus::FailedMaxRetries).unwrap();
        assert_eq!(json, "\"FAILED_MAX_RETRIES\"");
    }
}
