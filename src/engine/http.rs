// src/engine/http.rs
// =============================================================================
// A page engine that speaks plain HTTP.
//
// HttpEngine implements the engine traits without a browser:
// - goto() is a GET request (reqwest), bounded by the navigation timeout
// - with the "load"/"networkidle" wait strategies the page's stylesheets,
//   scripts and images are requested too, through the route handler, and
//   each response is reported to the response listeners
// - timing queries are answered from instants measured around the request
// - anchor queries are answered by parsing the HTML (see html.rs)
//
// What it can't do: run JavaScript. It never produces console messages, never
// reports an LCP value, and refuses screenshots.
// =============================================================================

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::html::{extract_anchor_links, extract_subresources};
use super::{
    BrowserEngine, BrowserPage, ConsoleListener, EngineLauncher, InterceptedRequest,
    NavigationResponse, PageQuery, ResponseEvent, ResponseListener, RouteDecision, RouteHandler,
};
use crate::config::WaitStrategy;
use crate::error::EngineError;
use crate::model::ResourceType;

// How many sub-resources of one page are fetched at once
const SUBRESOURCE_CONCURRENCY: usize = 8;

pub struct HttpEngineLauncher {
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for HttpEngineLauncher {
    fn default() -> Self {
        Self {
            user_agent: format!("site-sentry/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 5,
        }
    }
}

#[async_trait]
impl EngineLauncher for HttpEngineLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserEngine>, EngineError> {
        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
            .map_err(|e| EngineError::Launch(e.to_string()))?;
        Ok(Box::new(HttpEngine::new(client)))
    }
}

pub struct HttpEngine {
    client: Client,
}

impl HttpEngine {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BrowserEngine for HttpEngine {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, EngineError> {
        // reqwest clients share a connection pool, but no cookies or page state
        Ok(Box::new(HttpPage::new(self.client.clone())))
    }

    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

// Milliseconds since navigation start, like the Navigation Timing API
#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    request_start: f64,
    response_start: f64,
    load_event_end: f64,
}

struct LoadedDocument {
    url: String,
    html: String,
    timing: Timing,
}

#[derive(Default)]
struct PageState {
    route: Option<RouteHandler>,
    console_listeners: Vec<ConsoleListener>,
    response_listeners: Vec<ResponseListener>,
    document: Option<LoadedDocument>,
    closed: bool,
}

struct HttpPage {
    client: Client,
    state: Mutex<PageState>,
}

impl HttpPage {
    fn new(client: Client) -> Self {
        Self {
            client,
            state: Mutex::new(PageState::default()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PageState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.with_state(|state| state.closed) {
            return Err(EngineError::Navigation {
                url: String::new(),
                reason: "page is closed".into(),
            });
        }
        Ok(())
    }

    fn decide(&self, request: &InterceptedRequest) -> RouteDecision {
        self.with_state(|state| match &state.route {
            Some(handler) => handler(request),
            None => RouteDecision::Continue,
        })
    }

    fn emit_response(&self, event: ResponseEvent) {
        self.with_state(|state| {
            for listener in &state.response_listeners {
                listener(event.clone());
            }
        });
    }

    async fn navigate(
        &self,
        url: &str,
        wait: WaitStrategy,
        started: Instant,
    ) -> Result<NavigationResponse, EngineError> {
        let requested_at = Utc::now();
        let request_start = elapsed_ms(started);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| navigation_error(url, e))?;

        let response_start = elapsed_ms(started);
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        self.emit_response(ResponseEvent {
            url: final_url.clone(),
            method: "GET".into(),
            status,
            resource_type: ResourceType::Document,
            requested_at: Some(requested_at),
            responded_at: Utc::now(),
        });

        let html = response
            .text()
            .await
            .map_err(|e| navigation_error(url, e))?;

        if matches!(wait, WaitStrategy::Load | WaitStrategy::NetworkIdle) {
            self.load_subresources(&html, &final_url).await;
        }

        let timing = Timing {
            request_start,
            response_start,
            load_event_end: elapsed_ms(started),
        };
        self.with_state(|state| {
            state.document = Some(LoadedDocument {
                url: final_url.clone(),
                html,
                timing,
            })
        });

        Ok(NavigationResponse {
            url: final_url,
            status,
        })
    }

    // Requests every allowed sub-resource and reports the responses.
    // Requests that fail outright produce no response, as in a browser.
    async fn load_subresources(&self, html: &str, page_url: &str) {
        let allowed: Vec<_> = extract_subresources(html, page_url)
            .into_iter()
            .filter(|resource| {
                let request = InterceptedRequest {
                    url: resource.url.clone(),
                    method: "GET".into(),
                    resource_type: resource.resource_type,
                };
                let decision = self.decide(&request);
                if decision == RouteDecision::Abort {
                    tracing::debug!(url = %resource.url, kind = %resource.resource_type, "sub-request aborted");
                }
                decision == RouteDecision::Continue
            })
            .collect();

        let responses: Vec<Option<ResponseEvent>> = stream::iter(allowed)
            .map(|resource| {
                let client = self.client.clone();
                async move {
                    let requested_at = Utc::now();
                    let response = client.get(&resource.url).send().await.ok()?;
                    Some(ResponseEvent {
                        url: resource.url,
                        method: "GET".into(),
                        status: response.status().as_u16(),
                        resource_type: resource.resource_type,
                        requested_at: Some(requested_at),
                        responded_at: Utc::now(),
                    })
                }
            })
            .buffer_unordered(SUBRESOURCE_CONCURRENCY)
            .collect()
            .await;

        for event in responses.into_iter().flatten() {
            self.emit_response(event);
        }
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn route(&self, handler: RouteHandler) -> Result<(), EngineError> {
        self.with_state(|state| state.route = Some(handler));
        Ok(())
    }

    fn on_console(&self, listener: ConsoleListener) {
        // No JavaScript runs here, so this listener is never called
        self.with_state(|state| state.console_listeners.push(listener));
    }

    fn on_response(&self, listener: ResponseListener) {
        self.with_state(|state| state.response_listeners.push(listener));
    }

    async fn goto(
        &self,
        url: &str,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<Option<NavigationResponse>, EngineError> {
        self.ensure_open()?;

        let document = InterceptedRequest {
            url: url.to_string(),
            method: "GET".into(),
            resource_type: ResourceType::Document,
        };
        if self.decide(&document) == RouteDecision::Abort {
            return Err(EngineError::Aborted {
                url: url.to_string(),
            });
        }

        let started = Instant::now();
        match tokio::time::timeout(timeout, self.navigate(url, wait, started)).await {
            Ok(result) => result.map(Some),
            Err(_) => Err(EngineError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn evaluate(&self, query: PageQuery) -> Result<serde_json::Value, EngineError> {
        self.with_state(|state| {
            let Some(document) = &state.document else {
                return Err(EngineError::Evaluation("no document loaded".into()));
            };
            let value = match query {
                PageQuery::NavigationTiming => json!({
                    "fetchStart": 0.0,
                    "requestStart": document.timing.request_start,
                    "responseStart": document.timing.response_start,
                    "loadEventEnd": document.timing.load_event_end,
                }),
                PageQuery::LargestContentfulPaint => serde_json::Value::Null,
                PageQuery::AnchorHrefs => {
                    json!(extract_anchor_links(&document.html, &document.url))
                }
            };
            Ok(value)
        })
    }

    async fn set_viewport_size(&self, _width: u32, _height: u32) -> Result<(), EngineError> {
        // Nothing is rendered, so there is no layout to resize
        Ok(())
    }

    async fn screenshot(&self, _path: &Path) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("screenshots"))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.with_state(|state| {
            state.closed = true;
            state.route = None;
            state.console_listeners.clear();
            state.response_listeners.clear();
            state.document = None;
        });
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

// Turns a reqwest error into a navigation error with a readable reason
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Too many redirects
fn navigation_error(url: &str, error: reqwest::Error) -> EngineError {
    let error_string = error.to_string();

    let reason = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else if error.is_connect() {
        if error_string.contains("dns") {
            "could not resolve hostname".to_string()
        } else {
            "connection failed".to_string()
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        "SSL certificate error".to_string()
    } else {
        error_string
    };

    EngineError::Navigation {
        url: url.to_string(),
        reason,
    }
}
