//! MongoDB access for integration scenarios.
//!
//! [`DocumentClient`] wraps the official driver with the handful of calls
//! the scenarios need (ping, point queries, shutdown) and implements
//! [`test_env::ServiceClient`] so teardown can close it before the database
//! container goes away.

pub mod client;
pub mod errors;
pub mod restaurant;
pub mod uri;

pub use client::DocumentClient;
pub use errors::{DocumentError, DocumentResult};
pub use restaurant::{Address, Grade, Restaurant, RESTAURANTS_COLLECTION};
pub use uri::MongoUri;
