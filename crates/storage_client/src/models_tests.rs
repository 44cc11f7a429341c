use super::*;
use serde_json::json;

#[test]
fn test_object_attributes_accept_string_size() {
    let attrs: ObjectAttributes = serde_json::from_value(json!({
        "kind": "storage#object",
        "bucket": "sample-bucket",
        "name": "some_file.txt",
        "size": "33",
        "contentType": "text/plain",
        "metadata": { "foo": "bar" }
    }))
    .unwrap();

    assert_eq!(attrs.size, 33);
    assert_eq!(attrs.content_type.as_deref(), Some("text/plain"));
    assert_eq!(attrs.metadata.get("foo").map(String::as_str), Some("bar"));
}

#[test]
fn test_object_attributes_accept_numeric_size_and_missing_fields() {
    let attrs: ObjectAttributes =
        serde_json::from_value(json!({ "name": "a.txt", "size": 7 })).unwrap();

    assert_eq!(attrs.size, 7);
    assert!(attrs.metadata.is_empty());
    assert!(attrs.content_type.is_none());
}

#[test]
fn test_upload_metadata_omits_empty_fields() {
    let metadata = BTreeMap::new();
    let upload = UploadMetadata {
        name: "new_file.txt",
        content_type: None,
        metadata: &metadata,
    };

    assert_eq!(serde_json::to_value(&upload).unwrap(), json!({ "name": "new_file.txt" }));
}

#[test]
fn test_list_page_without_items() {
    let page: ListPage<Bucket> = serde_json::from_value(json!({ "kind": "storage#buckets" })).unwrap();

    assert!(page.items.is_empty());
    assert!(page.next_page_token.is_none());
}
