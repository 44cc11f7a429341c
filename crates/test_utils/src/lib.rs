//! Test utilities for the container test harness.
//!
//! This crate provides the naming conventions used for every container and
//! network the harness creates, plus helpers for locating fixture files
//! inside the workspace.

use chrono::Utc;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Extract workflow context from GitHub Actions environment for resource naming.
///
/// Returns:
/// - `pr{number}` for pull request workflows (e.g., "pr123")
/// - `main` for pushes to main/master branch
/// - the sanitized branch name for other branch pushes
/// - `local` for local development
///
/// Uses GITHUB_REF environment variable which contains:
/// - `refs/pull/{number}/merge` for pull requests
/// - `refs/heads/{branch}` for branch pushes
pub fn get_workflow_context() -> String {
    if let Ok(github_ref) = env::var("GITHUB_REF") {
        if let Some(rest) = github_ref.strip_prefix("refs/pull/") {
            if let Some(pr_num) = rest.split('/').next().filter(|n| !n.is_empty()) {
                return format!("pr{}", pr_num);
            }
        } else if let Some(branch) = github_ref.strip_prefix("refs/heads/") {
            if branch == "main" || branch == "master" {
                return "main".to_string();
            }
            let sanitized = sanitize_resource_name(branch);
            if !sanitized.is_empty() {
                return sanitized;
            }
        }
    }

    "local".to_string()
}

/// Reduce an arbitrary string to a Docker-safe resource name fragment.
///
/// Docker container and network names accept `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.
/// The result is lowercased, every other character becomes `-`, runs of
/// `-` are collapsed and leading/trailing separators are trimmed.
///
/// ```
/// use test_utils::sanitize_resource_name;
///
/// assert_eq!(sanitize_resource_name("Feature/New Thing"), "feature-new-thing");
/// assert_eq!(sanitize_resource_name("--mongo__db--"), "mongo__db");
/// ```
pub fn sanitize_resource_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        let mapped = if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            c
        } else {
            '-'
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    // Docker requires an alphanumeric first character.
    out.trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .trim_end_matches('-')
        .to_string()
}

/// Generate a unique resource name following the harness naming convention.
///
/// Format: `{prefix}-{context}-{timestamp}-{name}-{random}`
///
/// Where context is:
/// - `pr{number}` for PR workflows (e.g., pr123)
/// - `main` for main branch workflows
/// - `local` for local development
///
/// # Arguments
///
/// * `prefix` - Resource prefix shared by everything one harness creates (e.g. "tenv")
/// * `name` - Scenario or service name
///
/// # Examples
///
/// ```
/// use test_utils::generate_resource_name;
///
/// let name = generate_resource_name("tenv", "mongodb");
/// // Result: tenv-pr123-20240108-120000-mongodb-a1b2c3 (in PR)
/// // Result: tenv-local-20240108-120000-mongodb-a1b2c3 (local)
/// assert!(name.starts_with("tenv-"));
/// ```
pub fn generate_resource_name(prefix: &str, name: &str) -> String {
    let context = get_workflow_context();
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let random_suffix = Uuid::new_v4().simple().to_string()[..6].to_lowercase();
    format!(
        "{}-{}-{}-{}-{}",
        sanitize_resource_name(prefix),
        context,
        timestamp,
        sanitize_resource_name(name),
        random_suffix
    )
}

/// Check whether a resource name was produced by [`generate_resource_name`]
/// with the given prefix.
pub fn is_generated_name(prefix: &str, name: &str) -> bool {
    let name = name.trim_start_matches('/');
    let prefix = sanitize_resource_name(prefix);
    !prefix.is_empty() && name.starts_with(&format!("{}-", prefix))
}

/// Root directory of the cargo workspace.
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

/// Resolve a path relative to the workspace root.
///
/// Absolute paths are returned unchanged so environment overrides can point
/// anywhere on disk.
pub fn workspace_path(relative: impl AsRef<Path>) -> PathBuf {
    let relative = relative.as_ref();
    if relative.is_absolute() {
        return relative.to_path_buf();
    }
    let resolved = workspace_root().join(relative);
    debug!(path = %resolved.display(), "Resolved workspace path");
    resolved
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
