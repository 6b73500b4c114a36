//! Snapshot broadcaster: per-job pub/sub fan-out.
//!
//! Each job gets a broadcast channel created when the job is registered and
//! removed with it. Observers subscribe for the job they care about;
//! receivers drop on disconnect without affecting other subscribers, and a
//! send with no receivers is simply discarded. No replay is offered to a
//! late subscriber beyond the snapshot the HTTP layer sends at subscribe
//! time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::models::snapshot::{JobResult, Snapshot};

const CHANNEL_CAPACITY: usize = 256;

/// Tagged event pushed to observers of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental job-state snapshot.
    Snapshot(Box<Snapshot>),
    /// Terminal result document; the last event of a run.
    Done(Box<JobResult>),
    /// The run died outside the retry loop.
    Error { error: String },
}

/// Per-job broadcast channels.
#[derive(Default)]
pub struct SnapshotBroadcaster {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<StreamEvent>>>,
}

impl SnapshotBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel for a job. Called when the job is registered.
    pub async fn register(&self, job_id: Uuid) {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        self.channels.write().await.insert(job_id, sender);
    }

    /// Subscribe to a job's event stream. `None` for unknown jobs.
    pub async fn subscribe(&self, job_id: Uuid) -> Option<broadcast::Receiver<StreamEvent>> {
        self.channels
            .read()
            .await
            .get(&job_id)
            .map(broadcast::Sender::subscribe)
    }

    /// Push an event to every currently-open observer of a job. A send
    /// error only means there are no receivers right now; delivery to one
    /// subscriber can never be blocked by another.
    pub async fn broadcast(&self, job_id: Uuid, event: StreamEvent) {
        if let Some(sender) = self.channels.read().await.get(&job_id) {
            let _ = sender.send(event);
        }
    }

    /// Current number of observers for a job.
    pub async fn observer_count(&self, job_id: Uuid) -> usize {
        self.channels
            .read()
            .await
            .get(&job_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::job::{Job, RunRequest};

    fn snapshot() -> Snapshot {
        let request = RunRequest {
            repository_url: "https://github.com/acme/widget".to_string(),
            team_name: "Acme".to_string(),
            leader_name: "Casey".to_string(),
            retry_limit: None,
        };
        Snapshot::of(&Job::new(&request, 5))
    }

    #[tokio::test]
    async fn all_subscribers_receive_the_event() {
        let broadcaster = SnapshotBroadcaster::new();
        let job_id = Uuid::new_v4();
        broadcaster.register(job_id).await;

        let mut first = broadcaster.subscribe(job_id).await.unwrap();
        let mut second = broadcaster.subscribe(job_id).await.unwrap();
        assert_eq!(broadcaster.observer_count(job_id).await, 2);

        broadcaster
            .broadcast(job_id, StreamEvent::Snapshot(Box::new(snapshot())))
            .await;

        assert!(matches!(first.recv().await.unwrap(), StreamEvent::Snapshot(_)));
        assert!(matches!(second.recv().await.unwrap(), StreamEvent::Snapshot(_)));
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_block_others() {
        let broadcaster = SnapshotBroadcaster::new();
        let job_id = Uuid::new_v4();
        broadcaster.register(job_id).await;

        let dropped = broadcaster.subscribe(job_id).await.unwrap();
        let mut kept = broadcaster.subscribe(job_id).await.unwrap();
        drop(dropped);

        broadcaster
            .broadcast(job_id, StreamEvent::Error { error: "boom".to_string() })
            .await;

        assert!(matches!(kept.recv().await.unwrap(), StreamEvent::Error { .. }));
        assert_eq!(broadcaster.observer_count(job_id).await, 1);
    }

    #[tokio::test]
    async fn broadcast_without_observers_is_discarded() {
        let broadcaster = SnapshotBroadcaster::new();
        let job_id = Uuid::new_v4();
        broadcaster.register(job_id).await;

        // Must not panic or error with zero receivers.
        broadcaster
            .broadcast(job_id, StreamEvent::Snapshot(Box::new(snapshot())))
            .await;
    }

    #[tokio::test]
    async fn unknown_job_has_no_channel() {
        let broadcaster = SnapshotBroadcaster::new();
        assert!(broadcaster.subscribe(Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn events_serialize_with_type_and_payload_tags() {
        let event = StreamEvent::Error { error: "boom".to_string() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["error"], "boom");
    }
}
