use super::*;

#[test]
fn test_not_found_variants() {
    assert!(StorageError::BucketNotFound("sample-bucket".into()).is_not_found());
    assert!(StorageError::ObjectNotFound {
        bucket: "sample-bucket".into(),
        object: "new_file.txt".into(),
    }
    .is_not_found());
    assert!(!StorageError::TooManyRedirects(10).is_not_found());
}

#[test]
fn test_unexpected_status_message_names_operation() {
    let err = StorageError::UnexpectedStatus {
        operation: "list objects".into(),
        status: 500,
        body: "boom".into(),
    };

    assert_eq!(err.to_string(), "Unexpected HTTP 500 from list objects: boom");
}
