//! Cleanup every resource of one container pool run.
//!
//! Each pool labels its containers and networks with a run id, printed when
//! the pool starts. This binary removes everything carrying that label,
//! regardless of age.
//!
//! Usage:
//!   cleanup-run <run_id>

use anyhow::Context;
use std::env;
use test_cleanup::{CleanupConfig, ResourceCleanup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    test_cleanup::init_logging();

    let run_id = env::args()
        .nth(1)
        .filter(|id| !id.is_empty())
        .context("Usage: cleanup-run <run_id>")?;

    println!("🧹 Test Run Cleanup");
    println!("===================");
    println!();
    println!("📋 Run id: {}", run_id);
    println!();

    let config = CleanupConfig::from_env()?;
    let cleanup = ResourceCleanup::connect(&config).await?;

    let summary = cleanup.cleanup_run(&run_id).await?;

    println!("✅ Removed {} resources", summary.removed_count());
    for name in summary.containers.iter().chain(&summary.networks) {
        println!("   - {}", name);
    }

    if !summary.failures.is_empty() {
        for failure in &summary.failures {
            println!("⚠️  {}", failure);
        }
        anyhow::bail!("{} resources could not be removed", summary.failures.len());
    }

    Ok(())
}
