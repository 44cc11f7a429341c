//! Tests for test environment error types.

use super::*;

#[test]
fn infrastructure_errors_are_categorised() {
    let errors = [
        TestEnvError::RuntimeUnavailable {
            reason: "connection refused".to_string(),
        },
        TestEnvError::ImageUnavailable {
            image: "mongo:latest".to_string(),
            reason: "manifest unknown".to_string(),
        },
        TestEnvError::ImageBuildFailed {
            context: "seeder".to_string(),
            reason: "COPY failed".to_string(),
        },
        TestEnvError::PortNotMapped {
            container: "mongodb".to_string(),
            port: 27017,
        },
    ];

    for error in errors {
        assert_eq!(error.category(), ErrorCategory::Infrastructure, "{}", error);
        assert!(!error.is_escalated());
    }
}

#[test]
fn readiness_error_message_includes_attempts() {
    let error = TestEnvError::NotReady {
        service: "mongodb".to_string(),
        attempts: 7,
        elapsed: Duration::from_secs(60),
        last_error: "connection refused".to_string(),
    };

    assert_eq!(error.category(), ErrorCategory::Readiness);
    let message = error.to_string();
    assert!(message.contains("mongodb"));
    assert!(message.contains("7 attempt(s)"));
    assert!(message.contains("connection refused"));
}

#[test]
fn operation_helper_wraps_reason() {
    let error = TestEnvError::operation("read some_file.txt", "404 Not Found");

    assert_eq!(error.category(), ErrorCategory::Operation);
    assert_eq!(
        error.to_string(),
        "Operation 'read some_file.txt' failed: 404 Not Found"
    );
}

#[test]
fn only_disconnect_failures_are_escalated() {
    let disconnect = TestEnvError::DisconnectFailed {
        client: "mongodb".to_string(),
        reason: "timed out".to_string(),
    };
    let purge = TestEnvError::ContainerRemovalFailed {
        container: "mongoseeder".to_string(),
        reason: "no such container".to_string(),
    };
    let in_use = TestEnvError::NetworkInUse {
        network: "mongo_network".to_string(),
        attached: vec!["mongoseeder".to_string()],
    };

    assert_eq!(disconnect.category(), ErrorCategory::Teardown);
    assert_eq!(purge.category(), ErrorCategory::Teardown);
    assert_eq!(in_use.category(), ErrorCategory::Teardown);
    assert!(disconnect.is_escalated());
    assert!(!purge.is_escalated());
    assert!(!in_use.is_escalated());
}
