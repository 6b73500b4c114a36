use serde::{Deserialize, Serialize};

use super::job::DEFAULT_RETRY_LIMIT;

/// Main configuration structure for Mender
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub access and pipeline polling configuration
    #[serde(default)]
    pub github: GithubConfig,

    /// LLM patch-synthesis configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Sandboxed test runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Retry budget configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Job working-directory configuration
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

const fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

/// GitHub access and Actions polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GithubConfig {
    /// Access token. Required: without it the agent cannot observe the
    /// pipeline and refuses to run.
    #[serde(default)]
    pub token: Option<String>,

    /// REST API base URL
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// Seconds between pipeline poll requests
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Ceiling on a single pipeline poll, in seconds
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    10
}

const fn default_poll_timeout_secs() -> u64 {
    300
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_github_api_base(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// LLM patch-synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// API key. Optional: absence only disables patch synthesis, the
    /// heuristic fallbacks still run.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Messages API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum tokens per patch response
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

const fn default_llm_max_tokens() -> u32 {
    4096
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

/// Sandboxed test runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Container runtime binary
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    /// Hard ceiling on one test run, in seconds
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

const fn default_test_timeout_secs() -> u64 {
    600
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            docker_bin: default_docker_bin(),
            test_timeout_secs: default_test_timeout_secs(),
        }
    }
}

/// Retry budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Default retry limit when the request does not specify one
    #[serde(default = "default_retry_limit")]
    pub default_limit: u32,
}

const fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_retry_limit(),
        }
    }
}

/// Job working-directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceConfig {
    /// Root directory for per-job clones. Each job gets an exclusive
    /// subdirectory keyed by its id.
    #[serde(default = "default_workspace_root")]
    pub root: String,
}

fn default_workspace_root() -> String {
    ".mender/runs".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
