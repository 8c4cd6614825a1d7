//! SQLite-backed response cache split into named, versioned partitions.
//!
//! This module provides a persistent cache using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - One partition per class (shell, static, image, dynamic) per build generation
//! - URL-keyed entries, overwritten wholesale on every fresh successful fetch
//! - Generation cleanup that drops every partition of a previous build
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredEntry;
pub use partitions::{CacheNames, CachePartition, PartitionClass};
pub use store::CacheStore;
