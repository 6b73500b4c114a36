//! Issue domain model.
//!
//! An issue is one classified failure signal extracted from test or build
//! log text. Issues are created by the classifier, mutated by the patch
//! generator, and accumulated on the job (bounded to the most recent 100).

use serde::{Deserialize, Serialize};

/// Sentinel file path for issues without a parseable location.
pub const UNKNOWN_FILE: &str = "unknown";

/// Sentinel file path for failures attributed to the external pipeline.
pub const PIPELINE_FILE: &str = "pipeline";

/// Category of a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCategory {
    Linting,
    Syntax,
    /// Catch-all: most real failures are logic errors not covered by a
    /// narrower pattern.
    Logic,
    TypeError,
    Import,
    Indentation,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linting => "LINTING",
            Self::Syntax => "SYNTAX",
            Self::Logic => "LOGIC",
            Self::TypeError => "TYPE_ERROR",
            Self::Import => "IMPORT",
            Self::Indentation => "INDENTATION",
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an issue: OPEN until a fix attempt resolves it one way or
/// the other. Issues are never deleted, only truncated from the head of the
/// job's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Fixed,
    Failed,
}

/// One classified failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Source file path, or a sentinel (`unknown`, `pipeline`).
    pub file: String,
    /// Line number when a location grammar matched.
    pub line: Option<u32>,
    pub category: IssueCategory,
    pub status: IssueStatus,
    /// The matched log line, verbatim.
    pub detail: String,
    /// Commit message of the commit that carried the fix attempt, or
    /// `NO_COMMIT` when the working tree was unchanged.
    #[serde(default)]
    pub commit_message: Option<String>,
    /// One-line judge summary, filled in when the fix outcome is recorded.
    #[serde(default)]
    pub formatted_output: String,
}

impl Issue {
    pub fn new(file: impl Into<String>, line: Option<u32>, category: IssueCategory, detail: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            category,
            status: IssueStatus::Open,
            detail: detail.into(),
            commit_message: None,
            formatted_output: String::new(),
        }
    }

    /// Stamps the commit message and the judge summary once the fix
    /// outcome for this issue is known.
    pub fn record_outcome(&mut self, commit_message: &str) {
        self.commit_message = Some(commit_message.to_owned());
        self.formatted_output = self.summary();
    }

    /// Synthetic issue attributed to the external pipeline. Used when log
    /// classification finds nothing actionable but the run is known-failed.
    pub fn pipeline(detail: impl Into<String>) -> Self {
        Self::new(PIPELINE_FILE, None, IssueCategory::Logic, detail)
    }

    /// Whether `file` points at a real path in the working tree.
    pub fn has_real_path(&self) -> bool {
        self.file != UNKNOWN_FILE && self.file != PIPELINE_FILE
    }

    /// One-line human summary of the issue and its fix outcome.
    pub fn summary(&self) -> String {
        let location = match self.line {
            Some(line) => format!("{} line {line}", self.file),
            None => self.file.clone(),
        };
        let outcome = match self.status {
            IssueStatus::Open => "fix pending",
            IssueStatus::Fixed => "fix applied",
            IssueStatus::Failed => "fix attempt failed",
        };
        format!("{} error in {location} -> {outcome}: {}", self.category, self.detail)
    }
}
