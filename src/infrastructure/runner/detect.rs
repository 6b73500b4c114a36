//! Project shape detection.
//!
//! Inspects marker files in a fixed priority order and derives an execution
//! profile: Node manifests with runnable scripts win over Python project
//! files, then a Go module, then Maven/Gradle descriptors. An unrecognized
//! tree yields a profile whose command always fails, signaling "defer to
//! external CI, do not attempt local fixes blindly".

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::domain::error::AgentResult;
use crate::domain::ports::ProjectProfile;

const NODE_IMAGE: &str = "node:20-bullseye";
const PYTHON_IMAGE: &str = "python:3.11-bullseye";
const GO_IMAGE: &str = "golang:1.22-bullseye";
const JVM_IMAGE: &str = "maven:3.9.7-eclipse-temurin-17";

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn read_package_scripts(workdir: &Path) -> BTreeMap<String, String> {
    let manifest_path = workdir.join("package.json");
    let Ok(content) = tokio::fs::read_to_string(&manifest_path).await else {
        return BTreeMap::new();
    };
    serde_json::from_str::<PackageManifest>(&content)
        .map(|manifest| manifest.scripts)
        .unwrap_or_default()
}

fn node_profile(scripts: &BTreeMap<String, String>) -> ProjectProfile {
    let mut commands = Vec::new();
    if scripts.contains_key("lint") {
        commands.push("npm run lint".to_string());
    }
    if scripts.contains_key("test") {
        commands.push("npm test".to_string());
    }
    if scripts.contains_key("build") {
        commands.push("npm run build".to_string());
    }
    let suite = commands.join(" && ");
    let command = format!("npm ci || npm install; {suite}");

    ProjectProfile {
        tests_discovered: true,
        image: NODE_IMAGE.to_string(),
        command: command.clone(),
        fallback_command: command,
    }
}

fn python_profile() -> ProjectProfile {
    let command = [
        "python -m pip install --upgrade pip",
        "if [ -f requirements.txt ]; then pip install -r requirements.txt; fi",
        "pip install pytest",
        "pytest -q",
    ]
    .join("; ");

    ProjectProfile {
        tests_discovered: true,
        image: PYTHON_IMAGE.to_string(),
        command: command.clone(),
        fallback_command: command,
    }
}

fn go_profile() -> ProjectProfile {
    let command = "go test ./... -count=1".to_string();
    ProjectProfile {
        tests_discovered: true,
        image: GO_IMAGE.to_string(),
        command: command.clone(),
        fallback_command: command,
    }
}

fn jvm_profile(has_maven: bool) -> ProjectProfile {
    let command = if has_maven { "mvn -q test" } else { "gradle test" }.to_string();
    ProjectProfile {
        tests_discovered: true,
        image: JVM_IMAGE.to_string(),
        command: command.clone(),
        fallback_command: command,
    }
}

fn undetected_profile() -> ProjectProfile {
    ProjectProfile {
        tests_discovered: false,
        image: NODE_IMAGE.to_string(),
        command: "echo 'No supported test framework discovered'; exit 1".to_string(),
        fallback_command: "echo 'No supported test framework discovered'; exit 1".to_string(),
    }
}

/// Derive the execution profile for a working directory.
pub async fn detect_project(workdir: &Path) -> AgentResult<ProjectProfile> {
    let scripts = read_package_scripts(workdir).await;
    let has_runnable_scripts = ["test", "lint", "build"]
        .iter()
        .any(|name| scripts.contains_key(*name));
    if has_runnable_scripts {
        return Ok(node_profile(&scripts));
    }

    if path_exists(&workdir.join("pyproject.toml")).await
        || path_exists(&workdir.join("requirements.txt")).await
    {
        return Ok(python_profile());
    }

    if path_exists(&workdir.join("go.mod")).await {
        return Ok(go_profile());
    }

    let has_maven = path_exists(&workdir.join("pom.xml")).await;
    if has_maven
        || path_exists(&workdir.join("build.gradle")).await
        || path_exists(&workdir.join("build.gradle.kts")).await
    {
        return Ok(jvm_profile(has_maven));
    }

    Ok(undetected_profile())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(dir: &Path, name: &str, content: &str) {
        tokio::fs::write(dir.join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn node_manifest_with_scripts_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            "package.json",
            r#"{"scripts": {"test": "jest", "lint": "eslint ."}}"#,
        )
        .await;
        // Python markers present too, but Node has priority.
        touch(dir.path(), "requirements.txt", "pytest\n").await;

        let profile = detect_project(dir.path()).await.unwrap();
        assert!(profile.tests_discovered);
        assert_eq!(profile.image, NODE_IMAGE);
        assert!(profile.command.contains("npm run lint"));
        assert!(profile.command.contains("npm test"));
    }

    #[tokio::test]
    async fn node_manifest_without_runnable_scripts_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "package.json", r#"{"scripts": {"start": "node ."}}"#).await;
        touch(dir.path(), "go.mod", "module example.com/x\n").await;

        let profile = detect_project(dir.path()).await.unwrap();
        assert_eq!(profile.image, GO_IMAGE);
    }

    #[tokio::test]
    async fn pyproject_marks_python() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pyproject.toml", "[project]\nname = 'x'\n").await;

        let profile = detect_project(dir.path()).await.unwrap();
        assert!(profile.tests_discovered);
        assert_eq!(profile.image, PYTHON_IMAGE);
        assert!(profile.command.contains("pytest"));
    }

    #[tokio::test]
    async fn maven_beats_gradle() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pom.xml", "<project/>").await;
        touch(dir.path(), "build.gradle", "").await;

        let profile = detect_project(dir.path()).await.unwrap();
        assert_eq!(profile.command, "mvn -q test");
    }

    #[tokio::test]
    async fn gradle_alone_uses_gradle() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "build.gradle.kts", "").await;

        let profile = detect_project(dir.path()).await.unwrap();
        assert_eq!(profile.command, "gradle test");
    }

    #[tokio::test]
    async fn empty_tree_defers_to_external_ci() {
        let dir = tempfile::tempdir().unwrap();

        let profile = detect_project(dir.path()).await.unwrap();
        assert!(!profile.tests_discovered);
        assert!(profile.command.contains("exit 1"));
    }
}
