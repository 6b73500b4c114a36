//! In-process job registry.
//!
//! Plain identifier-to-job mapping owned by the coordinating state and
//! passed by reference to request handlers. All mutation of a given job
//! happens on its own task; observer reads always materialize a
//! momentarily-consistent snapshot under the lock.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::job::Job;
use crate::domain::models::snapshot::Snapshot;

/// Identifier → job mapping for the process lifetime.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.jobs.read().await.contains_key(&id)
    }

    /// Clone the current job state.
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Materialize a snapshot of the current job state.
    pub async fn snapshot(&self, id: Uuid) -> Option<Snapshot> {
        self.jobs.read().await.get(&id).map(Snapshot::of)
    }

    /// Mutate a job under the write lock and return a snapshot of the
    /// result. Returns `None` for unknown ids.
    pub async fn update<F>(&self, id: Uuid, mutate: F) -> Option<Snapshot>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        mutate(job);
        Some(Snapshot::of(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::job::{JobStatus, RunRequest};

    fn job() -> Job {
        let request = RunRequest {
            repository_url: "https://github.com/acme/widget".to_string(),
            team_name: "Acme".to_string(),
            leader_name: "Casey".to_string(),
            retry_limit: None,
        };
        Job::new(&request, 5)
    }

    #[tokio::test]
    async fn update_returns_snapshot_of_mutated_state() {
        let registry = JobRegistry::new();
        let job = job();
        let id = job.id;
        registry.insert(job).await;

        let snapshot = registry
            .update(id, |job| {
                job.status = JobStatus::Retrying;
                job.retries_used = 1;
            })
            .await
            .unwrap();

        assert_eq!(snapshot.metrics.status, JobStatus::Retrying);
        assert_eq!(snapshot.summary.iterations_used, "1/5");
    }

    #[tokio::test]
    async fn unknown_id_yields_none() {
        let registry = JobRegistry::new();
        assert!(registry.get(Uuid::new_v4()).await.is_none());
        assert!(registry.snapshot(Uuid::new_v4()).await.is_none());
        assert!(registry.update(Uuid::new_v4(), |_| {}).await.is_none());
    }
}
