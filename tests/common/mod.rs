// tests/common/mod.rs
// =============================================================================
// A scripted, in-memory page engine for integration tests.
//
// Each URL gets a PageScript saying what status the page returns, what it
// logs to the console, which sub-requests fail, which links it has, or that
// navigation fails outright. A shared EngineLog records what the orchestrator did
// with the engine: pages opened and closed, engine closes, the highest number
// of navigations in flight at the same time, viewport changes, screenshots
// written, and what the installed route handler decided for each request.
//
// Sub-requests listed as failed are offered to the route handler first; an
// aborted request never produces a response event.
// =============================================================================

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use site_sentry::config::{ScanConfig, ScanOptions, WaitStrategy};
use site_sentry::crawl::PageSessionCollector;
use site_sentry::engine::{
    BrowserEngine, BrowserPage, ConsoleListener, ConsoleMessage, EngineLauncher,
    InterceptedRequest, NavigationResponse, PageQuery, ResponseEvent, ResponseListener,
    RouteDecision, RouteHandler,
};
use site_sentry::error::EngineError;
use site_sentry::model::{ResourceType, ScanEvent};
use site_sentry::Orchestrator;

pub const BASE: &str = "https://site.test/";

#[derive(Debug, Clone)]
pub struct PageScript {
    pub status: u16,
    pub console: Vec<(String, String)>,
    pub failed_requests: Vec<(String, u16)>,
    pub links: Vec<String>,
    pub navigation_error: Option<String>,
    pub load_time_ms: u64,
    pub panics: bool,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            status: 200,
            console: Vec::new(),
            failed_requests: Vec::new(),
            links: Vec::new(),
            navigation_error: None,
            load_time_ms: 100,
            panics: false,
        }
    }
}

impl PageScript {
    pub fn links(links: &[&str]) -> Self {
        Self {
            links: links.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn console_error(mut self, text: &str) -> Self {
        self.console.push(("error".into(), text.into()));
        self
    }

    pub fn failed_request(mut self, url: &str, status: u16) -> Self {
        self.failed_requests.push((url.into(), status));
        self
    }

    pub fn navigation_error(reason: &str) -> Self {
        Self {
            navigation_error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn slow(mut self, load_time_ms: u64) -> Self {
        self.load_time_ms = load_time_ms;
        self
    }

    // Script evaluation on this page panics instead of returning
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }
}

#[derive(Default)]
pub struct EngineLog {
    pub launches: AtomicUsize,
    pub engine_closes: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    pub routes_installed: AtomicUsize,
    pub routed: Mutex<Vec<(String, RouteDecision)>>,
    pub viewports: Mutex<Vec<(u32, u32)>>,
    pub screenshots: Mutex<Vec<PathBuf>>,
}

impl EngineLog {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn routed(&self) -> Vec<(String, RouteDecision)> {
        self.routed.lock().unwrap().clone()
    }

    pub fn viewports(&self) -> Vec<(u32, u32)> {
        self.viewports.lock().unwrap().clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.screenshots.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct Site {
    pages: HashMap<String, PageScript>,
    latency: Duration,
    fail_launch: bool,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, script: PageScript) -> Self {
        self.pages.insert(url.to_string(), script);
        self
    }

    // Every navigation takes this long, so concurrent visits overlap
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn launcher(self) -> (FakeLauncher, Arc<EngineLog>) {
        let engine_log = Arc::new(EngineLog::default());
        let launcher = FakeLauncher {
            site: Arc::new(self),
            engine_log: Arc::clone(&engine_log),
        };
        (launcher, engine_log)
    }
}

pub struct FakeLauncher {
    site: Arc<Site>,
    engine_log: Arc<EngineLog>,
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, EngineError> {
        self.engine_log.launches.fetch_add(1, Ordering::SeqCst);
        if self.site.fail_launch {
            return Err(EngineError::Launch("browser binary not found".into()));
        }
        Ok(Box::new(FakeEngine {
            site: Arc::clone(&self.site),
            engine_log: Arc::clone(&self.engine_log),
        }))
    }
}

struct FakeEngine {
    site: Arc<Site>,
    engine_log: Arc<EngineLog>,
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, EngineError> {
        self.engine_log.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            engine_log: Arc::clone(&self.engine_log),
            route: Mutex::new(None),
            console: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            current: Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.engine_log.engine_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    site: Arc<Site>,
    engine_log: Arc<EngineLog>,
    route: Mutex<Option<RouteHandler>>,
    console: Mutex<Vec<ConsoleListener>>,
    responses: Mutex<Vec<ResponseListener>>,
    current: Mutex<Option<PageScript>>,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn route(&self, handler: RouteHandler) -> Result<(), EngineError> {
        self.engine_log.routes_installed.fetch_add(1, Ordering::SeqCst);
        *self.route.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn on_console(&self, listener: ConsoleListener) {
        self.console.lock().unwrap().push(listener);
    }

    fn on_response(&self, listener: ResponseListener) {
        self.responses.lock().unwrap().push(listener);
    }

    async fn goto(
        &self,
        url: &str,
        _wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<Option<NavigationResponse>, EngineError> {
        self.engine_log.navigations.lock().unwrap().push(url.to_string());
        let now = self.engine_log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.engine_log.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let slept = tokio::time::timeout(timeout, async {
            if !self.site.latency.is_zero() {
                tokio::time::sleep(self.site.latency).await;
            }
        })
        .await;
        self.engine_log.in_flight.fetch_sub(1, Ordering::SeqCst);

        if slept.is_err() {
            return Err(EngineError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        let script = self
            .site
            .pages
            .get(url)
            .cloned()
            .unwrap_or(PageScript {
                status: 404,
                ..PageScript::default()
            });

        if let Some(reason) = &script.navigation_error {
            return Err(EngineError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        for (kind, text) in &script.console {
            for listener in self.console.lock().unwrap().iter() {
                listener(ConsoleMessage {
                    kind: kind.clone(),
                    text: text.clone(),
                    location: None,
                    timestamp: Utc::now(),
                });
            }
        }

        for (request_url, status) in &script.failed_requests {
            let request = InterceptedRequest {
                url: request_url.clone(),
                method: "GET".into(),
                resource_type: ResourceType::Script,
            };
            let decision = match self.route.lock().unwrap().as_ref() {
                Some(handler) => handler(&request),
                None => RouteDecision::Continue,
            };
            self.engine_log
                .routed
                .lock()
                .unwrap()
                .push((request_url.clone(), decision));
            if decision == RouteDecision::Abort {
                continue;
            }

            for listener in self.responses.lock().unwrap().iter() {
                listener(ResponseEvent {
                    url: request_url.clone(),
                    method: "GET".into(),
                    status: *status,
                    resource_type: ResourceType::Script,
                    requested_at: None,
                    responded_at: Utc::now(),
                });
            }
        }

        let status = script.status;
        *self.current.lock().unwrap() = Some(script);
        Ok(Some(NavigationResponse {
            url: url.to_string(),
            status,
        }))
    }

    async fn evaluate(&self, query: PageQuery) -> Result<serde_json::Value, EngineError> {
        let current = self.current.lock().unwrap().clone().unwrap_or_default();
        if current.panics {
            panic!("renderer crashed while evaluating {:?}", query);
        }
        Ok(match query {
            PageQuery::NavigationTiming => json!({
                "fetchStart": 0,
                "requestStart": 5,
                "responseStart": 20,
                "loadEventEnd": current.load_time_ms,
            }),
            PageQuery::LargestContentfulPaint => serde_json::Value::Null,
            PageQuery::AnchorHrefs => json!(current.links),
        })
    }

    async fn set_viewport_size(&self, width: u32, height: u32) -> Result<(), EngineError> {
        self.engine_log.viewports.lock().unwrap().push((width, height));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), EngineError> {
        tokio::fs::write(path, b"png").await?;
        self.engine_log.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.engine_log.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// A config with screenshots off and the given base URL
pub fn options() -> ScanOptions {
    ScanOptions {
        base_url: Some(BASE.to_string()),
        screenshots: Some(false),
        ..ScanOptions::default()
    }
}

pub fn orchestrator(options: ScanOptions, launcher: FakeLauncher) -> Orchestrator {
    orchestrator_with(options, launcher, PageSessionCollector::new())
}

// Same, with a caller-tuned collector; the settle delay is always zeroed
pub fn orchestrator_with(
    options: ScanOptions,
    launcher: FakeLauncher,
    collector: PageSessionCollector,
) -> Orchestrator {
    let config = ScanConfig::resolve(options).unwrap();
    Orchestrator::new(config, launcher).with_collector(collector.with_settle_delay(Duration::ZERO))
}

// The URLs of page events with the given status, in emission order
pub fn pages_with(events: &[ScanEvent], status: site_sentry::model::PageStatus) -> Vec<String> {
    events
        .iter()
        .filter_map(ScanEvent::as_page)
        .filter(|page| page.status == status)
        .map(|page| page.url.clone())
        .collect()
}
