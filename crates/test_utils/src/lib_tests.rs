//! Tests for test utilities.

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn test_generate_resource_name() {
    unsafe {
        std::env::remove_var("GITHUB_REF");
    }
    let name = generate_resource_name("tenv", "mongodb");
    assert!(name.starts_with("tenv-local-"));
    assert!(name.contains("-mongodb-"));
    // Should include context, timestamp, name, and random suffix
    assert!(name.len() > 30);
}

#[test]
fn test_generated_names_are_unique() {
    let first = generate_resource_name("tenv", "gcs");
    let second = generate_resource_name("tenv", "gcs");
    assert_ne!(first, second);
}

#[test]
fn test_generate_resource_name_sanitizes_inputs() {
    let name = generate_resource_name("TEnv", "Object Storage/Round Trip");
    assert!(name.starts_with("tenv-"));
    assert!(name.contains("-object-storage-round-trip-"));
    assert!(!name.contains(' '));
    assert!(!name.contains('/'));
}

#[test]
fn test_sanitize_resource_name() {
    assert_eq!(sanitize_resource_name("mongo_network"), "mongo_network");
    assert_eq!(sanitize_resource_name("Feature/New Thing"), "feature-new-thing");
    assert_eq!(sanitize_resource_name("a  b"), "a-b");
    assert_eq!(sanitize_resource_name("..hidden"), "hidden");
    assert_eq!(sanitize_resource_name("///"), "");
}

#[test]
fn test_is_generated_name() {
    assert!(is_generated_name("tenv", "tenv-local-20240108-120000-mongodb-a1b2c3"));
    // Docker reports container names with a leading slash
    assert!(is_generated_name("tenv", "/tenv-pr12-20240108-120000-gcs-a1b2c3"));
    assert!(!is_generated_name("tenv", "tenvironment-db"));
    assert!(!is_generated_name("tenv", "mongodb"));
    assert!(!is_generated_name("", "-anything"));
}

#[test]
fn test_workspace_path_resolves_relative_paths() {
    let path = workspace_path("crates/test_utils/Cargo.toml");
    assert!(path.ends_with("crates/test_utils/Cargo.toml"));
    assert!(path.exists());
}

#[test]
fn test_workspace_path_keeps_absolute_paths() {
    let absolute = std::env::temp_dir().join("seed-data");
    assert_eq!(workspace_path(&absolute), absolute);
}

#[test]
#[serial]
fn test_get_workflow_context_pr() {
    unsafe {
        std::env::set_var("GITHUB_REF", "refs/pull/456/merge");
    }
    let context = get_workflow_context();
    assert_eq!(context, "pr456");
    unsafe {
        std::env::remove_var("GITHUB_REF");
    }
}

#[test]
#[serial]
fn test_get_workflow_context_main_branch() {
    unsafe {
        std::env::set_var("GITHUB_REF", "refs/heads/master");
    }
    let context = get_workflow_context();
    assert_eq!(context, "main");
    unsafe {
        std::env::remove_var("GITHUB_REF");
    }
}

#[test]
#[serial]
fn test_get_workflow_context_feature_branch() {
    unsafe {
        std::env::set_var("GITHUB_REF", "refs/heads/Feature/Mongo_Seeder");
    }
    let context = get_workflow_context();
    assert_eq!(context, "feature-mongo_seeder");
    unsafe {
        std::env::remove_var("GITHUB_REF");
    }
}

#[test]
#[serial]
fn test_get_workflow_context_local() {
    unsafe {
        std::env::remove_var("GITHUB_REF");
    }
    let context = get_workflow_context();
    assert_eq!(context, "local");
}
