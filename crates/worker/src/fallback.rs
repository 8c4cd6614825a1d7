//! Synthesized responses for when neither cache nor network can answer.
//!
//! Every strategy ends in one of these instead of an error, so the page
//! always receives a response it can interpret.

use tillcache_core::{Error, Response};
use url::Url;

/// Body returned for API calls while offline.
pub const OFFLINE_API_ERROR: &str = "Offline - API unavailable";

/// Body returned when the upstream answered but the answer was unusable.
pub const UPSTREAM_ERROR: &str = "Upstream response unusable";

const PLACEHOLDER_SVG: &str =
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1" viewBox="0 0 1 1"><rect width="1" height="1" fill="#e5e7eb"/></svg>"##;

const OFFLINE_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>You are offline</h1><p>Reconnect and try again.</p></body></html>";

/// `503` JSON error for API calls that could not reach the network.
pub fn offline_api() -> Response {
    Response::json(503, &serde_json::json!({ "error": OFFLINE_API_ERROR }))
}

/// `503` stand-in for a build asset, typed so the dependent load fails cleanly.
pub fn asset_unavailable(url: &Url) -> Response {
    Response::new(503, "")
        .with_header("content-type", guess_content_type(url.path()))
        .with_url(url)
}

/// `502` JSON error for a reachable upstream whose answer could not be used
/// (oversized body, rejected method). Never claims the network is offline.
pub fn upstream_error(error: &Error) -> Response {
    Response::json(502, &serde_json::json!({ "error": UPSTREAM_ERROR, "detail": error.to_string() }))
}

/// Inline placeholder image.
pub fn placeholder_image() -> Response {
    Response::new(200, PLACEHOLDER_SVG)
        .with_header("content-type", "image/svg+xml")
        .with_header("cache-control", "no-store")
}

/// Empty `503` for assets with no better stand-in.
pub fn empty_unavailable() -> Response {
    Response::new(503, "")
}

/// Minimal offline document, used only when no cached page exists at all.
pub fn offline_page() -> Response {
    Response::new(503, OFFLINE_HTML).with_header("content-type", "text/html; charset=utf-8")
}

/// Guess a content type from a path's extension.
pub fn guess_content_type(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default();
    match extension.as_str() {
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "html" => "text/html",
        "woff2" => "font/woff2",
        "woff" => "font/woff",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
