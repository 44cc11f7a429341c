//! Data the scenarios expect to find, or write, in the service containers.
//!
//! The seeded values live next to the container definitions: the storage
//! seed data under `testdata/gcs` and the restaurant collection in the
//! seeder build context. Keep both in sync with the constants here.

/// Object storage fixtures.
pub mod storage {
    /// Bucket created by the emulator from the mounted seed data.
    pub const SAMPLE_BUCKET: &str = "sample-bucket";

    /// Object present in [`SAMPLE_BUCKET`] from the start.
    pub const SEEDED_OBJECT: &str = "some_file.txt";

    /// Exact content of [`SEEDED_OBJECT`].
    pub const SEEDED_CONTENT: &[u8] = include_bytes!("../testdata/gcs/sample-bucket/some_file.txt");

    /// Object written, read back and deleted by the storage scenario.
    pub const NEW_OBJECT: &str = "new_file.txt";

    pub const NEW_OBJECT_CONTENT_TYPE: &str = "text/plain";

    /// Custom metadata attached to [`NEW_OBJECT`].
    pub const NEW_OBJECT_METADATA: &[(&str, &str)] =
        &[("x-goog-meta-foo", "foo"), ("x-goog-meta-bar", "bar")];

    /// Chunks written, in order, to [`NEW_OBJECT`].
    pub fn new_object_chunks() -> Vec<Vec<u8>> {
        let mut large = "f".repeat(4 * 1024).into_bytes();
        large.push(b'\n');
        vec![b"abcde\n".to_vec(), large]
    }

    /// Content [`NEW_OBJECT`] holds once every chunk is written.
    pub fn new_object_content() -> Vec<u8> {
        new_object_chunks().concat()
    }
}

/// Document database fixtures.
pub mod restaurants {
    /// Business key of the restaurant the lookup scenario queries.
    pub const RESTAURANT_ID: &str = "40356649";

    /// Expected values of the seeded restaurant.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ExpectedRestaurant {
        pub restaurant_id: &'static str,
        pub name: &'static str,
        pub borough: &'static str,
        pub cuisine: &'static str,
        pub building: &'static str,
        pub street: &'static str,
        pub zipcode: &'static str,
        pub coord: [f64; 2],
    }

    /// The restaurant seeded under [`RESTAURANT_ID`].
    pub fn regina_caterers() -> ExpectedRestaurant {
        ExpectedRestaurant {
            restaurant_id: RESTAURANT_ID,
            name: "Regina Caterers",
            borough: "Brooklyn",
            cuisine: "American",
            building: "6409",
            street: "11 Avenue",
            zipcode: "11219",
            coord: [-74.00528899999999, 40.628886],
        }
    }
}
