//! Core types and shared functionality for tillcache.
//!
//! This crate provides:
//! - Partitioned response cache with SQLite backend
//! - Request/response model shared by the worker and page contexts
//! - Page-to-worker message protocol
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod message;

pub use cache::{CacheDb, CacheNames, CachePartition, CacheStore, PartitionClass};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Destination, Request, RequestMode, Response};
pub use message::Message;
