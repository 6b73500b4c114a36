//! `mender run` - one-shot fix-and-verify job from the command line.

use std::sync::Arc;

use anyhow::bail;

use crate::application::Orchestrator;
use crate::domain::models::config::Config;
use crate::domain::models::job::{JobStatus, RunRequest};
use crate::domain::models::snapshot::{format_duration, JobResult};
use crate::infrastructure::AI_AGENT_COMMIT_PREFIX;

pub async fn execute(
    config: Config,
    repository_url: String,
    team: String,
    leader: String,
    retries: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let request = RunRequest {
        repository_url,
        team_name: team,
        leader_name: leader,
        retry_limit: retries,
    };

    let job = orchestrator.run_to_completion(request).await?;
    let result = JobResult::of(&job, AI_AGENT_COMMIT_PREFIX);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Status:     {}", job.status);
        println!("Branch:     {}", job.branch_name);
        println!("Iterations: {}/{}", job.retries_used, job.max_retries);
        println!("Commits:    {}", job.commit_count);
        println!("Fixes:      {}", job.total_fixes_applied);
        println!("Elapsed:    {}", format_duration(job.elapsed()));
        println!("Score:      {}/{}", job.score.total, job.score.max);
    }

    if job.status != JobStatus::Pass {
        bail!("job finished with status {}", job.status);
    }
    Ok(())
}
