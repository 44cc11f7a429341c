//! Cleanup orphaned test containers and networks.
//!
//! This binary removes harness containers and networks older than a
//! specified age. It's designed to be run from CI or manually for
//! maintenance after interrupted test runs.
//!
//! Usage:
//!   cleanup-orphans <max_age_hours>
//!
//! Optional environment variables:
//! - DOCKER_HOST: Docker daemon to connect to
//! - TEST_ENV_RESOURCE_PREFIX: resource name prefix (default: "tenv")

use std::env;
use test_cleanup::{CleanupConfig, ResourceCleanup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    test_cleanup::init_logging();

    // Get max age from command line args, default to 1 hour
    let max_age_hours: u64 = env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(1);

    println!("🧹 Test Container Cleanup");
    println!("========================");
    println!();

    let config = CleanupConfig::from_env()?;

    println!("📋 Configuration:");
    println!("   Resource prefix: {}", config.resource_prefix);
    println!("   Max age: {} hours", max_age_hours);
    println!();

    let cleanup = ResourceCleanup::connect(&config).await?;

    println!("🔍 Searching for orphaned test resources...");
    let summary = cleanup.cleanup_orphaned_resources(max_age_hours).await?;

    println!();
    println!("✅ Cleanup completed!");
    println!(
        "   Removed {} containers and {} networks",
        summary.containers.len(),
        summary.networks.len()
    );

    if summary.removed_count() == 0 {
        println!("   No resources found older than {} hours", max_age_hours);
    }
    for name in summary.containers.iter().chain(&summary.networks) {
        println!("   - {}", name);
    }

    if !summary.failures.is_empty() {
        println!();
        println!("⚠️  Failed to remove:");
        for failure in &summary.failures {
            println!("   - {}", failure);
        }
    }

    Ok(())
}
