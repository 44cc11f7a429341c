use super::*;
use crate::uri::MongoUri;
use std::time::Duration;

fn unreachable_uri() -> String {
    // Port 1 is never a MongoDB server.
    MongoUri::new("127.0.0.1", 1)
        .with_database("test_db")
        .with_server_selection_timeout(Duration::from_millis(200))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_malformed_uri_is_a_driver_error() {
    let result = DocumentClient::connect("not-a-mongodb-uri", "test_db").await;

    assert!(matches!(result, Err(DocumentError::Driver(_))));
}

#[tokio::test]
async fn test_ping_against_unreachable_server_fails() {
    let client = DocumentClient::connect(&unreachable_uri(), "test_db")
        .await
        .unwrap();

    let err = client.ping().await.unwrap_err();

    assert!(matches!(err, DocumentError::Driver(_)));
}

#[tokio::test]
async fn test_disconnect_of_idle_client_succeeds() {
    let client = DocumentClient::connect(&unreachable_uri(), "test_db")
        .await
        .unwrap()
        .with_label("restaurants-db");

    assert_eq!(client.label(), "restaurants-db");
    assert_eq!(client.database(), "test_db");
    client.disconnect().await.unwrap();
}

#[test]
fn test_document_error_becomes_operation_failure() {
    let err: TestEnvError = DocumentError::NotFound {
        collection: "restaurants".into(),
        filter: "{ \"restaurant_id\": \"1\" }".into(),
    }
    .into();

    assert!(matches!(err, TestEnvError::OperationFailed { .. }));
}
