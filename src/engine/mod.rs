// src/engine/mod.rs
// =============================================================================
// The page engine seam.
//
// The crawler never renders pages itself. It talks to a page engine through
// the traits below, which mirror what a browser automation library offers:
//
//   EngineLauncher::launch()    -> one engine per run
//   BrowserEngine::new_page()   -> one isolated page per visit
//   BrowserPage::route/on_*     -> request interception and event listeners
//   BrowserPage::goto/evaluate  -> navigation and in-page queries
//
// A real browser (Chromium over CDP, WebDriver, ...) plugs in by implementing
// these traits. This crate ships HttpEngine, a JavaScript-free engine built on
// reqwest + scraper, which is enough to crawl and check static sites.
// =============================================================================

mod html;
mod http;

pub use html::{extract_anchor_links, extract_subresources, Subresource};
pub use http::{HttpEngine, HttpEngineLauncher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::config::WaitStrategy;
use crate::error::EngineError;
use crate::model::ResourceType;

// A sub-request the page is about to make, offered to the route handler
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Continue,
    Abort,
}

// A console message as the engine reports it
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleMessage {
    pub kind: String,
    pub text: String,
    /// "url:line:column" when the engine knows where the message came from
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// A completed response observed on the page
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEvent {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub resource_type: ResourceType,
    /// When the request was sent, if the engine tracks request timing
    pub requested_at: Option<DateTime<Utc>>,
    pub responded_at: DateTime<Utc>,
}

// Result of the top-level navigation
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationResponse {
    pub url: String,
    pub status: u16,
}

// Queries evaluated inside the page. Each carries the script a JavaScript
// capable engine runs; other engines answer them natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageQuery {
    /// {fetchStart, requestStart, responseStart, loadEventEnd} in ms, or null
    NavigationTiming,
    /// Latest LCP entry start time in ms, or null
    LargestContentfulPaint,
    /// Array of absolute anchor targets
    AnchorHrefs,
}

impl PageQuery {
    pub fn script(&self) -> &'static str {
        match self {
            PageQuery::NavigationTiming => {
                "() => { const t = performance.getEntriesByType('navigation')[0]; \
                 return t ? { fetchStart: t.fetchStart, requestStart: t.requestStart, \
                 responseStart: t.responseStart, loadEventEnd: t.loadEventEnd } : null; }"
            }
            PageQuery::LargestContentfulPaint => {
                "() => { const e = performance.getEntriesByType('largest-contentful-paint'); \
                 return e.length ? e[e.length - 1].startTime : null; }"
            }
            PageQuery::AnchorHrefs => {
                "() => Array.from(document.querySelectorAll('a[href]')) \
                 .map(a => a.href).filter(h => h.startsWith('http'))"
            }
        }
    }
}

pub type RouteHandler = Box<dyn Fn(&InterceptedRequest) -> RouteDecision + Send + Sync>;
pub type ConsoleListener = Box<dyn Fn(ConsoleMessage) + Send + Sync>;
pub type ResponseListener = Box<dyn Fn(ResponseEvent) + Send + Sync>;

#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, EngineError>;
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    // Opens a fresh, isolated page. Pages are never shared between visits.
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    // Installs a handler consulted for every request the page makes
    async fn route(&self, handler: RouteHandler) -> Result<(), EngineError>;

    fn on_console(&self, listener: ConsoleListener);

    fn on_response(&self, listener: ResponseListener);

    // Returns None when the navigation produced no response object
    async fn goto(
        &self,
        url: &str,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<Option<NavigationResponse>, EngineError>;

    async fn evaluate(&self, query: PageQuery) -> Result<serde_json::Value, EngineError>;

    async fn set_viewport_size(&self, width: u32, height: u32) -> Result<(), EngineError>;

    // Captures the visible viewport (not the full page) to `path`
    async fn screenshot(&self, path: &Path) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}
