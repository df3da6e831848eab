//! Sentinel Storage crate - local SQLite key-value persistence.
//!
//! Provides a WAL-mode SQLite database with migrations, a string-keyed
//! store, and the profile store holding the auth flag and baseline.

pub mod db;
pub mod kv;
pub mod migrations;
pub mod profile;

pub use db::Database;
pub use kv::{KeyValueStore, SqliteKvStore};
pub use profile::{ProfileStore, AUTH_KEY, BASELINE_KEY};
