//! Mender - Autonomous CI repair agent
//!
//! Mender takes a repository URL and a retry budget, then repeatedly runs
//! the project's test suite in a container sandbox, classifies the failures
//! it finds in the logs, generates patches (LLM-produced unified diffs with
//! heuristic fallbacks), commits them to a policy-constrained fix branch,
//! and verifies the result against the repository's GitHub Actions
//! pipeline. Progress is streamed to observers as server-sent events and
//! the run is summarized in a scored result document.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture
//! principles:
//!
//! - **Domain Layer** (`domain`): Models, ports, and the error taxonomy
//! - **Application Layer** (`application`): The fix-and-verify state machine
//! - **Service Layer** (`services`): Classification, patching, job state
//! - **Infrastructure Layer** (`infrastructure`): Git, docker, GitHub, LLM
//! - **API Layer** (`api`): HTTP endpoints and SSE streaming
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mender::application::Orchestrator;
//! use mender::infrastructure::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
//!     mender::api::serve(&config.server, orchestrator).await
//! }
//! ```

pub mod api;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::Orchestrator;
pub use domain::error::{AgentError, AgentResult};
pub use domain::models::config::Config;
pub use domain::models::issue::{Issue, IssueCategory, IssueStatus};
pub use domain::models::job::{Job, JobStatus, RunRequest};
pub use domain::models::score::ScoreBreakdown;
pub use domain::models::snapshot::{JobResult, Snapshot};
