//! HTTP surface: run-agent endpoint, per-job SSE stream, health probe.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::application::Orchestrator;
use crate::domain::error::AgentError;
use crate::domain::models::config::ServerConfig;
use crate::domain::models::job::RunRequest;
use crate::services::broadcaster::StreamEvent;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Build the application router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/run-agent", post(run_agent))
        .route("/api/run-agent/stream/{job_id}", get(stream_job))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &ServerConfig, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Accept a run request and return the job id immediately. Execution
/// continues on a background task; progress is observed over the stream
/// endpoint.
async fn run_agent(State(state): State<AppState>, Json(request): Json<RunRequest>) -> Response {
    match state.orchestrator.start(request).await {
        Ok(job_id) => Json(json!({ "jobId": job_id })).into_response(),
        Err(AgentError::Configuration(message)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Server-sent events for one job. The first event is always the current
/// snapshot so late subscribers never start blind.
async fn stream_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Response {
    let broadcaster = state.orchestrator.broadcaster();
    let Some(receiver) = broadcaster.subscribe(job_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Job not found" })),
        )
            .into_response();
    };

    let current = state.orchestrator.registry().snapshot(job_id).await;
    let initial = futures::stream::iter(
        current
            .into_iter()
            .map(|snapshot| sse_event(&StreamEvent::Snapshot(Box::new(snapshot)))),
    );

    let updates = updates_stream(receiver).map(|event| sse_event(&event));

    Sse::new(initial.chain(updates))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Adapt a broadcast receiver into a stream, skipping lag gaps. The stream
/// ends when the sender side is dropped.
fn updates_stream(
    receiver: broadcast::Receiver<StreamEvent>,
) -> impl Stream<Item = StreamEvent> + Send {
    futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((event, receiver)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

fn sse_event(event: &StreamEvent) -> Result<Event, Infallible> {
    let built = match event {
        StreamEvent::Snapshot(snapshot) => Event::default().event("snapshot").json_data(snapshot),
        StreamEvent::Done(result) => Event::default().event("done").json_data(result),
        StreamEvent::Error { error } => Event::default()
            .event("error")
            .json_data(json!({ "error": error })),
    };
    // Serialization of our own models cannot fail; fall back to a bare
    // event rather than tearing down the stream.
    Ok(built.unwrap_or_default())
}
