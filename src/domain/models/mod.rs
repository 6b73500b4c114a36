pub mod config;
pub mod issue;
pub mod job;
pub mod score;
pub mod snapshot;

pub use config::{
    Config, GithubConfig, LlmConfig, LoggingConfig, RetryConfig, RunnerConfig, ServerConfig,
    WorkspaceConfig,
};
pub use issue::{Issue, IssueCategory, IssueStatus, PIPELINE_FILE, UNKNOWN_FILE};
pub use job::{Job, JobStatus, RunRequest, Severity, TimelineEntry};
pub use score::ScoreBreakdown;
pub use snapshot::{format_duration, JobResult, Metrics, Snapshot, Summary};
