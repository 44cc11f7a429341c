//! Integration test runner for the container harness.
//!
//! This binary starts the service containers for each scenario, exercises
//! the storage and document database clients against them and tears every
//! container and network down again.
//!
//! ## Usage
//!
//! ```bash
//! # Run all integration scenarios
//! cargo run --bin integration_tests
//!
//! # Run one scenario
//! cargo run --bin integration_tests -- --scenario restaurant-lookup
//!
//! # Remove leftovers of earlier runs first (default age: 24 hours)
//! cargo run --bin integration_tests -- --cleanup-orphans --max-age-hours 48
//! ```
//!
//! ## Environment Variables
//!
//! Everything is optional:
//! - `TEST_ENV_*`: readiness and teardown timing, resource name prefix
//! - `TEST_GCS_IMAGE`, `TEST_GCS_TAG`, `TEST_MONGO_IMAGE`, `TEST_MONGO_TAG`: service images
//! - `TEST_GCS_DATA_DIR`, `TEST_SEEDER_CONTEXT`: fixture locations
//! - `DOCKER_HOST`: Docker daemon to use
//! - `RUST_LOG`: log filter (default: info)

use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};
use std::path::Path;
use std::process;
use tracing::{error, info, warn};

use integration_tests::{HarnessConfig, IntegrationTestRunner, TestResult, TestScenario};
use test_env::{init_logging, EnvironmentConfig};

#[tokio::main]
async fn main() {
    init_logging();

    let matches = Command::new("integration_tests")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Container-backed integration tests for the storage and document clients")
        .arg(
            Arg::new("scenario")
                .long("scenario")
                .help("Run only this scenario")
                .value_name("NAME")
                .value_parser(PossibleValuesParser::new(
                    TestScenario::all().map(|s| s.test_name()),
                )),
        )
        .arg(
            Arg::new("cleanup-orphans")
                .long("cleanup-orphans")
                .help("Clean up orphaned test containers and networks before running tests")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-age-hours")
                .long("max-age-hours")
                .help("Maximum age in hours for orphaned resources (default: 24)")
                .value_name("HOURS")
                .default_value("24"),
        )
        .arg(
            Arg::new("cleanup-only")
                .long("cleanup-only")
                .help("Only perform cleanup, don't run tests")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Where to write the markdown test report")
                .value_name("PATH")
                .default_value("integration-test-report.md"),
        )
        .get_matches();

    match run_integration_tests(&matches).await {
        Ok(true) => info!("All integration tests passed successfully"),
        Ok(false) => process::exit(1),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Integration tests failed");
            process::exit(1);
        }
    }
}

/// Returns whether every scenario that ran passed.
async fn run_integration_tests(matches: &clap::ArgMatches) -> Result<bool> {
    info!("Starting container integration tests");

    let env_config =
        EnvironmentConfig::from_env().context("Failed to load environment configuration")?;
    let harness_config = HarnessConfig::from_env();

    info!(
        gcs_image = %format!("{}:{}", harness_config.gcs_image, harness_config.gcs_tag),
        mongo_image = %format!("{}:{}", harness_config.mongo_image, harness_config.mongo_tag),
        max_wait_secs = env_config.max_wait.as_secs(),
        "Loaded test configuration"
    );

    let test_runner = IntegrationTestRunner::new(env_config, harness_config)
        .await
        .context("Failed to initialize test runner")?;

    let cleanup_orphans = matches.get_flag("cleanup-orphans");
    let cleanup_only = matches.get_flag("cleanup-only");
    let max_age_hours: u64 = matches
        .get_one::<String>("max-age-hours")
        .context("max-age-hours has a default")?
        .parse()
        .context("Invalid max-age-hours value")?;

    if cleanup_orphans || cleanup_only {
        info!(max_age_hours = max_age_hours, "Starting orphaned resource cleanup");

        match test_runner.cleanup_orphaned_resources(max_age_hours).await {
            Ok(summary) if summary.removed_count() == 0 => {
                info!("No orphaned resources found for cleanup");
            }
            Ok(summary) => {
                info!(
                    containers = ?summary.containers,
                    networks = ?summary.networks,
                    failures = summary.failures.len(),
                    "Cleaned up orphaned resources"
                );
            }
            Err(e) => {
                // A failed cleanup does not invalidate the test run.
                warn!(error = %e, "Failed to cleanup orphaned resources");
            }
        }
    }

    if cleanup_only {
        info!("Cleanup completed, exiting as requested");
        return Ok(true);
    }

    let test_results = match matches.get_one::<String>("scenario") {
        Some(name) => {
            let scenario: TestScenario = name.parse()?;
            vec![test_runner.run_single_test(scenario).await]
        }
        None => test_runner.run_all_tests().await,
    };

    info!("=== Integration Test Results ===");

    for result in &test_results {
        let status = if result.success { "PASS" } else { "FAIL" };
        info!(
            scenario = %result.scenario,
            status = status,
            duration_ms = result.duration.as_millis() as u64,
            "Test result"
        );

        if let Some(error) = &result.error {
            error!(scenario = %result.scenario, error = %error, "Test failure details");
        }

        info!(
            scenario = %result.scenario,
            provisioned = result.details.provisioned,
            ready = result.details.ready,
            executed = result.details.executed,
            verified = result.details.verified,
            teardown_clean = result.details.teardown_clean,
            "Test execution details"
        );
    }

    let failed_tests = test_results.iter().filter(|r| !r.success).count();
    info!(
        total = test_results.len(),
        passed = test_results.len() - failed_tests,
        failed = failed_tests,
        "=== Test Suite Summary ==="
    );

    // Teardown runs per scenario; this only catches what a crashed
    // teardown may have left.
    match test_runner.cleanup_run_resources().await {
        Ok(summary) if summary.removed_count() > 0 => {
            warn!(removed = summary.removed_count(), "Removed resources left behind by this run");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to check for leftover resources"),
    }

    let report_path = matches
        .get_one::<String>("report")
        .context("report has a default")?;
    write_test_report(Path::new(report_path), &test_results)?;

    if failed_tests > 0 {
        error!(
            "Integration test suite failed with {} failed tests",
            failed_tests
        );
        return Ok(false);
    }

    Ok(true)
}

fn mark(passed: bool) -> &'static str {
    if passed { "✅" } else { "❌" }
}

/// Write a markdown report for CI systems.
fn write_test_report(path: &Path, results: &[TestResult]) -> Result<()> {
    use std::fmt::Write;

    let mut report = String::new();

    writeln!(report, "# Container Integration Test Report")?;
    writeln!(report)?;
    writeln!(
        report,
        "Generated: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(report)?;

    writeln!(report, "## Summary")?;
    writeln!(report)?;
    writeln!(report, "| Metric | Value |")?;
    writeln!(report, "|--------|-------|")?;
    writeln!(report, "| Total Tests | {} |", results.len())?;
    writeln!(
        report,
        "| Passed | {} |",
        results.iter().filter(|r| r.success).count()
    )?;
    writeln!(
        report,
        "| Failed | {} |",
        results.iter().filter(|r| !r.success).count()
    )?;
    writeln!(
        report,
        "| Total Duration | {:.2}s |",
        results
            .iter()
            .map(|r| r.duration.as_secs_f64())
            .sum::<f64>()
    )?;
    writeln!(report)?;

    writeln!(report, "## Test Results")?;
    writeln!(report)?;

    for result in results {
        writeln!(report, "### {} {}", mark(result.success), result.scenario.title())?;
        writeln!(report)?;
        writeln!(
            report,
            "- **Status**: {}",
            if result.success { "PASSED" } else { "FAILED" }
        )?;
        writeln!(report, "- **Duration**: {:.2}s", result.duration.as_secs_f64())?;

        if let Some(error) = &result.error {
            writeln!(report, "- **Error**: {}", error)?;
        }

        writeln!(report, "- **Provisioned**: {}", mark(result.details.provisioned))?;
        writeln!(report, "- **Ready**: {}", mark(result.details.ready))?;
        writeln!(report, "- **Executed**: {}", mark(result.details.executed))?;
        writeln!(report, "- **Verified**: {}", mark(result.details.verified))?;
        writeln!(
            report,
            "- **Teardown Clean**: {}",
            mark(result.details.teardown_clean)
        )?;

        if let Some(verification) = &result.verification {
            writeln!(report, "- **Checks**: {}", verification.checks.join(", "))?;
        }
        writeln!(report)?;
    }

    std::fs::write(path, report).context("Failed to write test report")?;

    info!(path = %path.display(), "Test report written");
    Ok(())
}
