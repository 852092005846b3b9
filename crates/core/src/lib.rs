//! Core types and shared functionality for honyaku.
//!
//! This crate provides:
//! - Versioned cache store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BucketInfo, CacheDb, CachedResponse};
pub use config::{AppConfig, ConfigError, EngineConfig};
pub use error::Error;
