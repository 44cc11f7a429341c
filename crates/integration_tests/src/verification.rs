//! Comparison of observed service state with the scenario fixtures.
//!
//! Each check records what it looked at, so a report can show which
//! expectations were verified and which ones failed.

use document_client::Restaurant;
use storage_client::ObjectAttributes;

use crate::fixtures::restaurants::ExpectedRestaurant;

/// Outcome of comparing observed data against a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureVerification {
    /// Every check passed
    pub passed: bool,
    /// Names of the checks performed, in order
    pub checks: Vec<String>,
    /// Detailed verification failures
    pub failures: Vec<String>,
}

impl FixtureVerification {
    /// Create a successful verification result
    pub fn success() -> Self {
        Self {
            passed: true,
            checks: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Add a failure reason to this verification
    pub fn add_failure(&mut self, reason: String) {
        self.passed = false;
        self.failures.push(reason);
    }

    /// Record that `check` ran; `failure` is added when the check did not hold.
    pub fn check(&mut self, check: &str, failure: Option<String>) {
        self.checks.push(check.to_string());
        if let Some(reason) = failure {
            self.add_failure(format!("{}: {}", check, reason));
        }
    }

    /// Fold the checks and failures of `other` into this result.
    pub fn merge(&mut self, other: FixtureVerification) {
        self.checks.extend(other.checks);
        for failure in other.failures {
            self.add_failure(failure);
        }
    }
}

fn mismatch<T: std::fmt::Debug + PartialEq>(expected: T, actual: T) -> Option<String> {
    (expected != actual).then(|| format!("expected {:?}, found {:?}", expected, actual))
}

/// Check that the restaurant found in the database is the seeded one.
pub fn verify_restaurant(actual: &Restaurant, expected: &ExpectedRestaurant) -> FixtureVerification {
    let mut result = FixtureVerification::success();

    result.check(
        "restaurant_id",
        mismatch(expected.restaurant_id, actual.restaurant_id.as_str()),
    );
    result.check("name", mismatch(expected.name, actual.name.as_str()));
    result.check("borough", mismatch(expected.borough, actual.borough.as_str()));
    result.check("cuisine", mismatch(expected.cuisine, actual.cuisine.as_str()));
    result.check(
        "address",
        mismatch(
            (expected.building, expected.street, expected.zipcode),
            (
                actual.address.building.as_str(),
                actual.address.street.as_str(),
                actual.address.zipcode.as_str(),
            ),
        ),
    );
    result.check(
        "coord",
        mismatch(expected.coord.as_slice(), actual.address.coord.as_slice()),
    );

    result
}

/// Check that every expected object name is listed.
pub fn verify_listing(objects: &[ObjectAttributes], expected: &[&str]) -> FixtureVerification {
    let mut result = FixtureVerification::success();
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|name| !objects.iter().any(|o| o.name == *name))
        .collect();

    result.check(
        "listing",
        (!missing.is_empty()).then(|| format!("objects not listed: {:?}", missing)),
    );
    result
}

/// Check that content read back is byte-identical to what was written.
pub fn verify_content(check: &str, expected: &[u8], actual: &[u8]) -> FixtureVerification {
    let mut result = FixtureVerification::success();

    let failure = if expected.len() != actual.len() {
        Some(format!(
            "expected {} bytes, read {} bytes",
            expected.len(),
            actual.len()
        ))
    } else {
        expected
            .iter()
            .zip(actual)
            .position(|(e, a)| e != a)
            .map(|offset| format!("content differs at byte {}", offset))
    };

    result.check(check, failure);
    result
}

/// Check the attributes the emulator reports for a written object.
pub fn verify_attributes(
    attributes: &ObjectAttributes,
    expected_size: usize,
    content_type: &str,
    metadata: &[(&str, &str)],
) -> FixtureVerification {
    let mut result = FixtureVerification::success();

    result.check("size", mismatch(expected_size as u64, attributes.size));
    result.check(
        "content_type",
        mismatch(Some(content_type), attributes.content_type.as_deref()),
    );

    let missing: Vec<String> = metadata
        .iter()
        .filter(|(key, value)| attributes.metadata.get(*key).map(String::as_str) != Some(*value))
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    result.check(
        "metadata",
        (!missing.is_empty()).then(|| format!("missing or different: {:?}", missing)),
    );

    result
}

#[cfg(test)]
#[path = "verification_tests.rs"]
mod tests;
