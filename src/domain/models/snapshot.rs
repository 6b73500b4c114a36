//! Read-only projections of job state.
//!
//! A snapshot is a derived, point-in-time view combining job state with the
//! formatted elapsed time and the metrics/summary projections observers
//! consume. Snapshots are constructed on demand and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::issue::Issue;
use super::job::{Job, JobStatus, TimelineEntry};
use super::score::ScoreBreakdown;

/// Format an elapsed duration as `MM:SS`.
pub fn format_duration(elapsed: std::time::Duration) -> String {
    let total_seconds = elapsed.as_secs();
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Headline metrics shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// `total/max`, e.g. `100/110`.
    pub score: String,
    /// Formatted elapsed time, `MM:SS`.
    pub total_time: String,
    pub status: JobStatus,
}

/// Run summary projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub repository: String,
    pub team_name: String,
    pub leader_name: String,
    pub branch_name: String,
    pub total_failures_detected: u64,
    pub total_fixes_applied: u64,
    pub final_status: JobStatus,
    pub total_time: String,
    pub commit_count: u32,
    /// `used/allowed`, e.g. `3/5`.
    pub iterations_used: String,
}

/// Point-in-time read view of a job for observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub is_running: bool,
    pub error: Option<String>,
    pub metrics: Metrics,
    pub summary: Summary,
    pub fixes: Vec<Issue>,
    pub timeline: Vec<TimelineEntry>,
    pub score: ScoreBreakdown,
}

impl Snapshot {
    /// Materialize a snapshot from current job state.
    pub fn of(job: &Job) -> Self {
        let total_time = format_duration(job.elapsed());
        Self {
            is_running: job.is_running,
            error: job.error.clone(),
            metrics: Metrics {
                score: format!("{}/{}", job.score.total, job.score.max),
                total_time: total_time.clone(),
                status: job.status,
            },
            summary: Summary {
                repository: job.repository.clone(),
                team_name: job.team_name.clone(),
                leader_name: job.leader_name.clone(),
                branch_name: job.branch_name.clone(),
                total_failures_detected: job.total_failures_detected,
                total_fixes_applied: job.total_fixes_applied,
                final_status: job.status,
                total_time,
                commit_count: job.commit_count,
                iterations_used: format!("{}/{}", job.retries_used, job.max_retries),
            },
            fixes: job.issues.clone(),
            timeline: job.timeline.clone(),
            score: job.score,
        }
    }
}

/// Result document written once at job termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: Uuid,
    pub repository: String,
    pub branch: String,
    pub team_name: String,
    pub leader_name: String,
    pub retries_used: u32,
    pub max_retries: u32,
    pub status: JobStatus,
    pub commit_prefix: String,
    pub commit_count: u32,
    pub total_failures_detected: u64,
    pub total_fixes_applied: u64,
    pub bugs: Vec<Issue>,
    pub score_breakdown: ScoreBreakdown,
    pub metrics: Metrics,
    pub generated_at: DateTime<Utc>,
}

impl JobResult {
    /// Build the result document from terminal job state.
    pub fn of(job: &Job, commit_prefix: &str) -> Self {
        let snapshot = Snapshot::of(job);
        Self {
            job_id: job.id,
            repository: job.repository.clone(),
            branch: job.branch_name.clone(),
            team_name: job.team_name.clone(),
            leader_name: job.leader_name.clone(),
            retries_used: job.retries_used,
            max_retries: job.max_retries,
            status: job.status,
            commit_prefix: commit_prefix.to_string(),
            commit_count: job.commit_count,
            total_failures_detected: job.total_failures_detected,
            total_fixes_applied: job.total_fixes_applied,
            bugs: job.issues.clone(),
            score_breakdown: job.score,
            metrics: snapshot.metrics,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::issue::{IssueCategory, IssueStatus};
    use crate::domain::models::job::RunRequest;

    fn job() -> Job {
        let request = RunRequest {
            repository_url: "https://github.com/acme/widget".to_string(),
            team_name: "Acme".to_string(),
            leader_name: "Casey".to_string(),
            retry_limit: Some(3),
        };
        Job::new(&request, 3)
    }

    #[test]
    fn format_duration_pads_minutes_and_seconds() {
        assert_eq!(format_duration(std::time::Duration::from_secs(0)), "00:00");
        assert_eq!(format_duration(std::time::Duration::from_secs(65)), "01:05");
        assert_eq!(format_duration(std::time::Duration::from_secs(600)), "10:00");
    }

    #[test]
    fn snapshot_projects_iterations_and_score() {
        let mut job = job();
        job.retries_used = 2;
        let snapshot = Snapshot::of(&job);
        assert_eq!(snapshot.summary.iterations_used, "2/3");
        assert_eq!(snapshot.metrics.score, "0/110");
        assert!(snapshot.is_running);
    }

    #[test]
    fn result_document_reproduces_job_totals() {
        let mut job = job();
        job.total_failures_detected = 4;
        job.total_fixes_applied = 2;
        job.commit_count = 1;
        job.status = JobStatus::Pass;
        job.is_running = false;
        let mut bug = Issue::new("src/app.js", Some(3), IssueCategory::Syntax, "unexpected token");
        bug.status = IssueStatus::Fixed;
        bug.record_outcome("[AI-AGENT] Retry 1 automated fixes");
        job.record_issues([bug]);

        let result = JobResult::of(&job, "[AI-AGENT]");
        assert_eq!(result.total_failures_detected, 4);
        assert_eq!(result.total_fixes_applied, 2);
        assert_eq!(result.commit_count, 1);
        assert_eq!(result.status, JobStatus::Pass);

        // Round-trips through JSON without losing totals or the judge line.
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"formattedOutput\""));
        let back: JobResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_failures_detected, result.total_failures_detected);
        assert_eq!(back.total_fixes_applied, result.total_fixes_applied);
        assert_eq!(back.score_breakdown, result.score_breakdown);
        assert!(back.bugs[0].formatted_output.contains("fix applied"));
    }
}
