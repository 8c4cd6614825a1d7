//! Build-asset discovery in a loaded page.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// `rel` values whose `<link href>` points at something the page will load.
const LOADED_LINK_RELS: &[&str] = &["stylesheet", "preload", "modulepreload", "prefetch"];

/// Collect the build-asset URLs a page currently references.
///
/// Reads `<script src>` and `<link href>` (stylesheets, preloads, module
/// preloads, prefetches), resolves relative URLs against `page_url`, and keeps
/// only same-origin URLs under `static_prefix`. Scripts come first, then
/// links, each in document order; duplicates keep their first position.
pub fn scan_build_assets(html: &str, page_url: &Url, static_prefix: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    let scripts = Selector::parse("script[src]").expect("invalid selector");
    let links = Selector::parse("link[href]").expect("invalid selector");

    let script_refs = document.select(&scripts).filter_map(|el| el.value().attr("src"));
    let link_refs = document
        .select(&links)
        .filter(|el| {
            el.value()
                .attr("rel")
                .map(|rel| rel.split_ascii_whitespace().any(|r| LOADED_LINK_RELS.contains(&r.to_ascii_lowercase().as_str())))
                .unwrap_or(false)
        })
        .filter_map(|el| el.value().attr("href"));

    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    for reference in script_refs.chain(link_refs) {
        let mut resolved = match page_url.join(reference.trim()) {
            Ok(u) => u,
            Err(_) => continue,
        };
        resolved.set_fragment(None);

        if resolved.origin() != page_url.origin() || !resolved.path().starts_with(static_prefix) {
            continue;
        }

        if seen.insert(resolved.to_string()) {
            assets.push(resolved);
        }
    }

    assets
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/_next/static/";

    fn page() -> Url {
        Url::parse("http://localhost:3000/invoices").unwrap()
    }

    fn paths(assets: &[Url]) -> Vec<&str> {
        assets.iter().map(|u| u.path()).collect()
    }

    #[test]
    fn test_scan_scripts_and_styles() {
        let html = r#"
            <html>
                <head>
                    <link rel="stylesheet" href="/_next/static/css/app-9f8e.css">
                    <script src="/_next/static/chunks/webpack-11aa.js" defer></script>
                </head>
                <body>
                    <script src="/_next/static/chunks/main-22bb.js"></script>
                </body>
            </html>
        "#;

        let assets = scan_build_assets(html, &page(), PREFIX);

        assert_eq!(
            paths(&assets),
            vec![
                "/_next/static/chunks/webpack-11aa.js",
                "/_next/static/chunks/main-22bb.js",
                "/_next/static/css/app-9f8e.css",
            ]
        );
    }

    #[test]
    fn test_scan_includes_preloads() {
        let html = r#"
            <head>
                <link rel="preload" as="font" href="/_next/static/media/inter-33cc.woff2" crossorigin>
                <link rel="modulepreload" href="/_next/static/chunks/page-44dd.js">
                <link rel="icon" href="/_next/static/media/favicon.ico">
            </head>
        "#;

        let assets = scan_build_assets(html, &page(), PREFIX);

        assert_eq!(paths(&assets), vec!["/_next/static/media/inter-33cc.woff2", "/_next/static/chunks/page-44dd.js"]);
    }

    #[test]
    fn test_scan_skips_non_build_and_cross_origin() {
        let html = r#"
            <head>
                <script src="/sw-register.js"></script>
                <script src="https://cdn.example.com/_next/static/chunks/x.js"></script>
                <link rel="stylesheet" href="https://fonts.googleapis.com/css2?family=Inter">
                <script>inline()</script>
            </head>
        "#;

        let assets = scan_build_assets(html, &page(), PREFIX);

        assert!(assets.is_empty());
    }

    #[test]
    fn test_scan_resolves_relative_and_dedupes() {
        let html = r#"
            <head>
                <script src="_next/static/chunks/a.js"></script>
                <script src="/_next/static/chunks/a.js"></script>
                <link rel="preload" as="script" href="http://localhost:3000/_next/static/chunks/a.js#frag">
            </head>
        "#;

        let page = Url::parse("http://localhost:3000/").unwrap();
        let assets = scan_build_assets(html, &page, PREFIX);

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].as_str(), "http://localhost:3000/_next/static/chunks/a.js");
    }

    #[test]
    fn test_scan_rel_is_case_insensitive_token_list() {
        let html = r#"<link rel="Prefetch alternate" href="/_next/static/chunks/next-page.js">"#;

        let assets = scan_build_assets(html, &page(), PREFIX);

        assert_eq!(paths(&assets), vec!["/_next/static/chunks/next-page.js"]);
    }

    #[test]
    fn test_scan_empty_document() {
        assert!(scan_build_assets("", &page(), PREFIX).is_empty());
    }
}
