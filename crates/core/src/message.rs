//! Page-to-worker message protocol.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```json
//! { "type": "SKIP_WAITING" }
//! { "type": "CACHE_URLS", "urls": ["/_next/static/chunks/main-abc123.js"] }
//! ```

use serde::{Deserialize, Serialize};

/// A command posted from a page context to the controlling worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Activate the waiting worker without waiting for pages to close.
    SkipWaiting,
    /// Best-effort add of each URL to the static partition.
    CacheUrls {
        #[serde(default)]
        urls: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_waiting_wire_format() {
        let json = serde_json::to_string(&Message::SkipWaiting).unwrap();
        assert_eq!(json, r#"{"type":"SKIP_WAITING"}"#);
        let parsed: Message = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(parsed, Message::SkipWaiting);
    }

    #[test]
    fn test_cache_urls_wire_format() {
        let parsed: Message =
            serde_json::from_str(r#"{"type":"CACHE_URLS","urls":["/a.js","https://x.test/b.css"]}"#).unwrap();
        assert_eq!(parsed, Message::CacheUrls { urls: vec!["/a.js".into(), "https://x.test/b.css".into()] });
    }

    #[test]
    fn test_cache_urls_missing_list() {
        let parsed: Message = serde_json::from_str(r#"{"type":"CACHE_URLS"}"#).unwrap();
        assert_eq!(parsed, Message::CacheUrls { urls: Vec::new() });
    }

    #[test]
    fn test_unknown_type_rejected() {
        let parsed = serde_json::from_str::<Message>(r#"{"type":"CLEAR_ALL"}"#);
        assert!(parsed.is_err());
    }
}
