// src/crawl/session.rs
// =============================================================================
// One page visit.
//
// The collector opens a fresh page, wires up whatever capture the config asks
// for, navigates, waits a moment for late console output, then reads timings,
// takes screenshots and lists the page's links. The page is closed on every
// path out of visit(), whether collection succeeded or not.
//
// The collector does not decide which links are worth crawling. It returns
// every absolute anchor target and leaves admission to the orchestrator.
// =============================================================================

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use super::filter::same_origin;
use crate::config::{ResourceBlocking, ScanConfig, Viewport};
use crate::engine::{
    BrowserEngine, BrowserPage, ConsoleMessage, InterceptedRequest, PageQuery, ResponseEvent,
    RouteDecision,
};
use crate::error::EngineError;
use crate::model::{ConsoleEntry, NetworkRequest, PerformanceMetrics, Screenshot, SignalBundle};

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

// Pause after navigation so late scripts can still log to the console.
// Trades per-page latency for completeness; it is not a guarantee.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

// Everything one visit produced
#[derive(Debug, Clone)]
pub struct PageVisit {
    pub bundle: SignalBundle,
    pub links: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PageSessionCollector {
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl Default for PageSessionCollector {
    fn default() -> Self {
        Self {
            navigation_timeout: NAVIGATION_TIMEOUT,
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl PageSessionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub async fn visit(
        &self,
        url: &str,
        config: &ScanConfig,
        engine: &dyn BrowserEngine,
    ) -> Result<PageVisit, EngineError> {
        let page = engine.new_page().await?;
        let result = contain_panic(self.collect(page.as_ref(), url, config)).await;

        if let Err(e) = page.close().await {
            tracing::warn!(url, error = %e, "failed to close page");
        }
        result
    }

    async fn collect(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        config: &ScanConfig,
    ) -> Result<PageVisit, EngineError> {
        if config.blocking.is_enabled() {
            let base = config.base_url.clone();
            let blocking = config.blocking.clone();
            page.route(Box::new(move |request: &InterceptedRequest| {
                route_decision(request, &base, &blocking)
            }))
            .await?;
        }

        let console: Arc<Mutex<Vec<ConsoleEntry>>> = Arc::default();
        if config.capture.console {
            let log = Arc::clone(&console);
            page.on_console(Box::new(move |message: ConsoleMessage| {
                lock(&log).push(ConsoleEntry {
                    kind: message.kind,
                    text: message.text,
                    source: message.location,
                    timestamp: message.timestamp,
                });
            }));
        }

        let network: Arc<Mutex<Vec<NetworkRequest>>> = Arc::default();
        if config.capture.network {
            let log = Arc::clone(&network);
            page.on_response(Box::new(move |response: ResponseEvent| {
                lock(&log).push(network_record(response));
            }));
        }

        let response = page
            .goto(url, config.wait_strategy, self.navigation_timeout)
            .await?;
        let status = response.map(|r| r.status).unwrap_or(0);

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let performance = if config.capture.performance {
            Some(read_performance(page).await?)
        } else {
            None
        };

        let screenshots = if config.capture.screenshots {
            capture_screenshots(page, url, config).await?
        } else {
            Vec::new()
        };

        let links = discover_links(page).await?;

        let mut bundle = SignalBundle::new(url, status);
        bundle.console = std::mem::take(&mut *lock(&console));
        bundle.network = std::mem::take(&mut *lock(&network));
        bundle.performance = performance;
        bundle.screenshots = screenshots;
        bundle.captured_at = Utc::now();

        Ok(PageVisit { bundle, links })
    }
}

// Runs a page-scoped future, turning a panic inside it into an EngineError
pub(crate) async fn contain_panic<T>(
    future: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(EngineError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// The interception policy, evaluated for every request the page makes:
// - blocked resource types are aborted wherever they point
// - with block_external, other origins are aborted unless the URL contains
//   one of the allowed domain substrings
// - everything else continues untouched
pub fn route_decision(
    request: &InterceptedRequest,
    base: &Url,
    blocking: &ResourceBlocking,
) -> RouteDecision {
    if blocking.blocked_types.contains(&request.resource_type) {
        return RouteDecision::Abort;
    }

    if blocking.block_external {
        let external = match Url::parse(&request.url) {
            Ok(target) => !same_origin(base, &target),
            Err(_) => true,
        };
        let whitelisted = blocking
            .allowed_domains
            .iter()
            .any(|domain| request.url.contains(domain.as_str()));
        if external && !whitelisted {
            return RouteDecision::Abort;
        }
    }

    RouteDecision::Continue
}

fn network_record(response: ResponseEvent) -> NetworkRequest {
    let duration_ms = response
        .requested_at
        .map(|sent| (response.responded_at - sent).num_milliseconds().max(0) as u64)
        .unwrap_or(0);

    NetworkRequest {
        failed: response.status >= 400,
        url: response.url,
        method: response.method,
        status: response.status,
        resource_type: response.resource_type,
        duration_ms,
        timestamp: response.responded_at,
    }
}

async fn read_performance(page: &dyn BrowserPage) -> Result<PerformanceMetrics, EngineError> {
    let timing = page.evaluate(PageQuery::NavigationTiming).await?;
    let lcp = page.evaluate(PageQuery::LargestContentfulPaint).await?;

    Ok(PerformanceMetrics {
        load_time_ms: span_ms(&timing, "fetchStart", "loadEventEnd"),
        time_to_first_byte_ms: span_ms(&timing, "requestStart", "responseStart"),
        largest_contentful_paint_ms: lcp.as_f64().map(|ms| ms.max(0.0).round() as u64),
    })
}

// end - start from a timing object; missing entries count as zero
fn span_ms(timing: &serde_json::Value, start: &str, end: &str) -> u64 {
    let read = |key: &str| timing.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    (read(end) - read(start)).max(0.0).round() as u64
}

async fn capture_screenshots(
    page: &dyn BrowserPage,
    url: &str,
    config: &ScanConfig,
) -> Result<Vec<Screenshot>, EngineError> {
    tokio::fs::create_dir_all(&config.screenshot_dir).await?;

    let mut screenshots = Vec::with_capacity(config.viewports.len());
    for &viewport in &config.viewports {
        let (width, height) = viewport.dimensions();
        page.set_viewport_size(width, height).await?;

        let path = config.screenshot_dir.join(screenshot_file_name(url, viewport));
        page.screenshot(&path).await?;

        screenshots.push(Screenshot {
            viewport,
            path,
            width,
            height,
        });
    }
    Ok(screenshots)
}

// "https://example.com/blog/post?id=1" -> "example-com-blog-post-id-1-<hash>-desktop.png"
// The hash keeps URLs that slug the same apart.
pub fn screenshot_file_name(url: &str, viewport: Viewport) -> PathBuf {
    let trimmed = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut slug: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    slug.truncate(80);

    let hash = Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).simple().to_string();
    PathBuf::from(format!("{}-{}-{}.png", slug, &hash[..8], viewport))
}

async fn discover_links(page: &dyn BrowserPage) -> Result<Vec<String>, EngineError> {
    let value = page.evaluate(PageQuery::AnchorHrefs).await?;
    let links = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Ok(links)
}
