//! Cleanup test resources created by a specific PR.
//!
//! Resource names embed the CI context (`pr{number}` for pull requests), so
//! everything a PR's runs left behind can be removed when it is closed or
//! merged.
//!
//! Usage:
//!   cleanup-pr <pr_number>

use anyhow::Context;
use std::env;
use test_cleanup::{CleanupConfig, ResourceCleanup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    test_cleanup::init_logging();

    let pr_number: u32 = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .context("Usage: cleanup-pr <pr_number>")?;

    println!("🧹 PR-Based Test Resource Cleanup");
    println!("=================================");
    println!();
    println!("📋 PR Number: #{}", pr_number);
    println!();

    let config = CleanupConfig::from_env()?;
    let cleanup = ResourceCleanup::connect(&config).await?;

    let summary = cleanup.cleanup_pr_resources(pr_number).await?;

    println!("✅ Cleanup completed!");
    println!("   Removed {} resources", summary.removed_count());
    for name in summary.containers.iter().chain(&summary.networks) {
        println!("   - {}", name);
    }
    for failure in &summary.failures {
        println!("⚠️  {}", failure);
    }

    Ok(())
}
