//! Versioned, SQLite-backed cache store.
//!
//! Cached responses live in named buckets. Exactly one bucket (the one named
//! after the running worker version) is current; every other bucket is stale
//! and is deleted wholesale on activation.
//!
//! - Request identity is a SHA-256 key over method and canonical URL
//! - Automatic schema migrations
//! - WAL mode so concurrent fetch handlers can read while one writes

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use buckets::BucketInfo;
pub use connection::CacheDb;
pub use entries::CachedResponse;
