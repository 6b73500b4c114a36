//! GitHub Actions poll client.
//!
//! Polls the "list workflow runs for branch" endpoint at a fixed interval
//! until the latest run completes or the poll budget is exhausted. Absence
//! of a credential is reported as a distinct configuration-error verdict,
//! never silently treated as pass or fail.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::models::config::GithubConfig;
use crate::domain::ports::{PipelineObserver, PipelineVerdict};

static OWNER_REPO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com[/:]([^/]+)/([^/.]+)").expect("valid regex"));

/// Parse `owner/repo` out of an HTTPS or SSH GitHub URL.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let captures = OWNER_REPO.captures(url)?;
    let owner = captures[1].to_string();
    let repo = captures[2].trim_end_matches(".git").to_string();
    Some((owner, repo))
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    name: Option<String>,
    status: String,
    conclusion: Option<String>,
}

/// REST client for the external CI system.
pub struct ActionsClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ActionsClient {
    pub fn new(config: &GithubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("mender/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        })
    }

    async fn latest_run(&self, owner: &str, repo: &str, branch: &str) -> anyhow::Result<Option<WorkflowRun>> {
        let url = format!("{}/repos/{owner}/{repo}/actions/runs", self.api_base);
        let mut request = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github.v3+json")
            .query(&[("branch", branch), ("per_page", "1")]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let mut runs: WorkflowRunsResponse = response.json().await?;
        Ok(if runs.workflow_runs.is_empty() {
            None
        } else {
            Some(runs.workflow_runs.remove(0))
        })
    }
}

#[async_trait]
impl PipelineObserver for ActionsClient {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn poll(&self, repository_url: &str, branch: &str) -> PipelineVerdict {
        if !self.is_configured() {
            return PipelineVerdict {
                configuration_error: true,
                reason: Some("GitHub token not configured".to_string()),
                ..PipelineVerdict::default()
            };
        }

        let Some((owner, repo)) = parse_owner_repo(repository_url) else {
            return PipelineVerdict {
                reason: Some(format!("invalid GitHub URL: {repository_url}")),
                ..PipelineVerdict::default()
            };
        };

        info!(%owner, %repo, branch, "polling pipeline");
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        while tokio::time::Instant::now() < deadline {
            match self.latest_run(&owner, &repo, branch).await {
                Ok(Some(run)) if run.status == "completed" => {
                    let passed = run.conclusion.as_deref() == Some("success");
                    info!(workflow = ?run.name, conclusion = ?run.conclusion, "pipeline completed");
                    return PipelineVerdict {
                        passed,
                        conclusion: run.conclusion,
                        workflow_name: run.name,
                        ..PipelineVerdict::default()
                    };
                }
                Ok(Some(run)) => {
                    debug!(status = %run.status, "pipeline still running");
                }
                Ok(None) => {
                    debug!(branch, "no workflow runs yet, waiting");
                }
                Err(err) => {
                    // Transient API failures keep polling until the budget
                    // runs out.
                    warn!(%err, "pipeline poll request failed");
                }
            }
            sleep(self.poll_interval).await;
        }

        warn!(branch, "pipeline poll timed out");
        PipelineVerdict {
            timed_out: true,
            reason: Some(format!(
                "timeout after {}s waiting for pipeline",
                self.poll_timeout.as_secs()
            )),
            ..PipelineVerdict::default()
        }
    }
}
