//! Resolving page and message URLs into cacheable absolute URLs.

use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve `input` against `base` into a normalized http(s) URL.
///
/// Relative inputs are joined onto `base`; absolute inputs keep their own
/// origin. The host is lower-cased, the fragment dropped and the query left
/// untouched. Any scheme other than http(s) is rejected.
pub fn resolve(base: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut url = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    // `Url` already lower-cases domains; IP and opaque hosts pass through as-is.
    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        url.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:3000/dashboard").unwrap()
    }

    #[test]
    fn test_relative_path_joins_origin() {
        let url = resolve(&base(), "/_next/static/chunks/main-abc.js").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/_next/static/chunks/main-abc.js");
    }

    #[test]
    fn test_path_relative_to_page() {
        let url = resolve(&base(), "chunks/a.js").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/chunks/a.js");
    }

    #[test]
    fn test_absolute_url_normalized() {
        let url = resolve(&base(), "https://CDN.example.com/font.woff2?v=2#x").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/font.woff2?v=2");
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        for input in ["data:text/plain,hi", "blob:http://localhost:3000/uuid", "chrome-extension://abc/x.js"] {
            assert!(matches!(resolve(&base(), input), Err(UrlError::UnsupportedScheme(_))), "{input}");
        }
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(matches!(resolve(&base(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&base(), "   "), Err(UrlError::Empty)));
    }
}
