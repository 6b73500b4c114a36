//! Infrastructure layer: external integrations and adapters.

pub mod config;
pub mod git;
pub mod github;
pub mod llm;
pub mod logging;
pub mod process;
pub mod runner;

pub use config::{ConfigError, ConfigLoader};
pub use git::{GitCli, AI_AGENT_COMMIT_PREFIX};
pub use github::ActionsClient;
pub use llm::LlmClient;
pub use runner::SandboxRunner;
