//! Response headers for the worker script itself.
//!
//! The script must never be served from an HTTP cache, or browsers would
//! keep running a stale worker after a deploy, and it must be allowed to
//! control the whole origin.

use bytes::Bytes;
use tillcache_core::Response;

pub const SCRIPT_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Wrap the worker script source in a response with the required headers.
pub fn script_response(source: impl Into<Bytes>, scope: &str) -> Response {
    Response::new(200, source)
        .with_header("content-type", "application/javascript; charset=utf-8")
        .with_header("cache-control", SCRIPT_CACHE_CONTROL)
        .with_header("service-worker-allowed", scope)
}
