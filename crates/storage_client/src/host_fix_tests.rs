use super::*;

fn rewrite() -> HostRewrite {
    HostRewrite::new("gcs:4443", "127.0.0.1:49153").unwrap()
}

#[test]
fn test_authorities_round_trip() {
    let rewrite = rewrite();

    assert_eq!(rewrite.virtual_authority(), "gcs:4443");
    assert_eq!(rewrite.local_authority(), "127.0.0.1:49153");
}

#[test]
fn test_location_on_virtual_host_is_redirected_locally() {
    let location = "http://gcs:4443/download/storage/v1/b/sample-bucket/o/some_file.txt?alt=media";

    assert_eq!(
        rewrite().rewrite_location(location),
        "http://127.0.0.1:49153/download/storage/v1/b/sample-bucket/o/some_file.txt?alt=media"
    );
}

#[test]
fn test_foreign_and_relative_locations_are_untouched() {
    let rewrite = rewrite();

    assert_eq!(
        rewrite.rewrite_location("http://storage.googleapis.com/b/x"),
        "http://storage.googleapis.com/b/x"
    );
    assert_eq!(rewrite.rewrite_location("http://gcs:9000/b/x"), "http://gcs:9000/b/x");
    assert_eq!(rewrite.rewrite_location("/storage/v1/b"), "/storage/v1/b");
}

#[test]
fn test_apply_to_headers_replaces_location() {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static("http://gcs:4443/storage/v1/b"));

    rewrite().apply_to_headers(&mut headers);

    assert_eq!(headers[LOCATION], "http://127.0.0.1:49153/storage/v1/b");
}

#[test]
fn test_invalid_authority_is_rejected() {
    assert!(matches!(
        HostRewrite::new("gcs:4443/path", "127.0.0.1:1"),
        Err(StorageError::InvalidEndpoint { .. })
    ));
    assert!(HostRewrite::new("", "127.0.0.1:1").is_err());
}
