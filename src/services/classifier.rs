//! Heuristic log classifier.
//!
//! Scans raw failure output and produces a bounded list of structured
//! issues. Pure function of its input: same log text, same issues.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::models::issue::{Issue, IssueCategory, UNKNOWN_FILE};

/// Upper bound on classified issues per run, bounding downstream
/// patch-generation cost.
pub const MAX_ISSUES: usize = 30;

/// Lines without one of these indicators are not failure signals.
static ERROR_INDICATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(error|failed|warning|exception|cannot)").expect("valid regex"));

/// Interpreter style: `File "path/to/file.py", line 42`
static INTERPRETER_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "(.+?)", line (\d+)"#).expect("valid regex"));

/// Compiler style: `path/to/file.ts(42,5)`
static COMPILER_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./\\-]+?)\((\d+),").expect("valid regex"));

/// Generic style: `path/to/file.js:42:5`
static GENERIC_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./\\-]+):(\d+)(?::\d+)?").expect("valid regex"));

/// Categorize a failure line by ordered keyword matching. LOGIC is the
/// catch-all: most real failures are logic errors not covered by a narrower
/// pattern.
fn detect_category(line: &str) -> IssueCategory {
    let input = line.to_lowercase();
    if input.contains("eslint") || input.contains("lint") {
        IssueCategory::Linting
    } else if input.contains("syntaxerror") || input.contains("unexpected token") {
        IssueCategory::Syntax
    } else if input.contains("typeerror") || input.contains("type error") || input.contains(" ts") {
        IssueCategory::TypeError
    } else if input.contains("cannot find module") || input.contains("module not found") {
        IssueCategory::Import
    } else if input.contains("indent") {
        IssueCategory::Indentation
    } else {
        IssueCategory::Logic
    }
}

/// Extract a file/line location by trying the three grammars in order;
/// first match wins.
fn parse_location(line: &str) -> (String, Option<u32>) {
    for grammar in [&*INTERPRETER_LOCATION, &*COMPILER_LOCATION, &*GENERIC_LOCATION] {
        if let Some(captures) = grammar.captures(line) {
            let file = captures[1].to_string();
            let line_number = captures[2].parse::<u32>().ok();
            return (file, line_number);
        }
    }
    (UNKNOWN_FILE.to_string(), None)
}

/// Classify raw log text into structured issues.
///
/// Never returns an empty list: if no line matches any indicator despite
/// the caller asserting the run failed, a single synthetic LOGIC issue
/// attributed to the pipeline is returned so the retry loop always has an
/// actionable signal.
pub fn classify(logs: &str) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();

    for line in logs.lines() {
        let line = line.trim();
        if line.is_empty() || !ERROR_INDICATOR.is_match(line) {
            continue;
        }

        let category = detect_category(line);
        let (file, line_number) = parse_location(line);
        issues.push(Issue::new(file, line_number, category, line));

        if issues.len() == MAX_ISSUES {
            break;
        }
    }

    if issues.is_empty() {
        return vec![Issue::pipeline(
            "No explicit parser match found, but test command failed.",
        )];
    }

    issues
}
