// src/engine/html.rs
// =============================================================================
// This module pulls URLs out of HTML pages for the HTTP engine.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
//
// Two things are extracted:
// - anchor targets (<a href>), which feed the crawl frontier
// - sub-resources (<img src>, <script src>, <link rel=stylesheet href>),
//   which the engine requests so their responses show up as network traffic
//
// Everything is resolved against the page URL, the same way a browser
// resolves `a.href`, so callers always get absolute URLs.
// =============================================================================

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::model::ResourceType;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("valid selector"));
static SCRIPTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[src]").expect("valid selector"));
static STYLESHEETS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel~=stylesheet][href]").expect("valid selector"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subresource {
    pub url: String,
    pub resource_type: ResourceType,
}

// Extracts all absolute http(s) anchor targets from a page
//
// Example:
//   html = "<a href='/docs'>Docs</a>"
//   base_url = "https://example.com"
//   result = ["https://example.com/docs"]
pub fn extract_anchor_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&ANCHORS)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_url(&base, href))
        .filter(|url| is_http_url(url))
        .collect()
}

// Extracts stylesheets, then scripts, then images, each in document order
pub fn extract_subresources(html: &str, base_url: &str) -> Vec<Subresource> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let kinds: [(&Selector, &str, ResourceType); 3] = [
        (&*STYLESHEETS, "href", ResourceType::Stylesheet),
        (&*SCRIPTS, "src", ResourceType::Script),
        (&*IMAGES, "src", ResourceType::Image),
    ];

    let mut resources = Vec::new();
    for (selector, attr, resource_type) in kinds {
        for element in document.select(selector) {
            let Some(url) = element
                .value()
                .attr(attr)
                .and_then(|value| resolve_url(&base, value))
                .filter(|url| is_http_url(url))
            else {
                continue;
            };
            resources.push(Subresource { url, resource_type });
        }
    }
    resources
}

// Resolves a possibly-relative URL to an absolute URL
//
// Examples:
//   base = "https://example.com/page"
//   href = "/docs" -> Some("https://example.com/docs")
//   href = "../other" -> Some("https://example.com/other")
//   href = "https://other.com" -> Some("https://other.com/")
fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.join(href).ok().map(|url| url.to_string()),
    }
}

// mailto:, tel:, javascript:, data: and friends are not crawlable
fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
