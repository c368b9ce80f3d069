// src/crawl/orchestrator.rs
// =============================================================================
// Runs a whole scan.
//
// How it works:
// 1. Launch the page engine (a failure here aborts the run)
// 2. Emit ScanStart and seed the frontier with the base URL
// 3. While the frontier has URLs and the page budget isn't spent:
//    - pop the next URL, skip it if it was already visited
//    - mark it visited, emit page(scanning), visit it
//    - run issue detection on the collected signals
//    - admit same-origin, pattern-approved links into the frontier
//    - emit the page's issues and page(complete), or page(failed)
//    - emit ScanProgress
// 4. Emit recurring-issue patterns and ScanComplete
// 5. Close the engine, whatever happened above
//
// Event order per page, with progressive + prioritize_critical:
//   page(scanning) -> critical issues -> page(complete|failed) -> other issues
//   -> progress
//
// Concurrency: up to `concurrency` page visits are in flight at once. They
// are futures polled on this task, so the frontier and counters have exactly
// one writer and need no locking. With concurrency 1 the loop is strictly
// sequential.
// =============================================================================

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::filter::{normalize_link, same_origin};
use super::patterns::PatternTracker;
use super::queue::Frontier;
use super::session::{contain_panic, PageSessionCollector, PageVisit};
use super::sink::EventSink;
use crate::checker::detect_issues;
use crate::config::ScanConfig;
use crate::engine::{BrowserEngine, EngineLauncher};
use crate::error::{EngineError, ScanError, SinkClosed};
use crate::model::{
    Issue, PageScanResult, ScanComplete, ScanEvent, ScanProgress, ScanStart, Severity,
};

// Counters for one run. They only ever go up.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub pages_scanned: usize,
    pub issues_found: usize,
    pub critical_issues: usize,
}

impl RunState {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            pages_scanned: 0,
            issues_found: 0,
            critical_issues: 0,
        }
    }

    fn record_page(&mut self, issues: &[Issue]) {
        self.pages_scanned += 1;
        self.issues_found += issues.len();
        self.critical_issues += issues.iter().filter(|i| i.is_critical()).count();
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            pages_scanned: self.pages_scanned,
            issues_found: self.issues_found,
            critical_issues: self.critical_issues,
            duration_ms: self.elapsed_ms(),
        }
    }
}

// What run() hands back once the scan is over
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub pages_scanned: usize,
    pub issues_found: usize,
    pub critical_issues: usize,
    pub duration_ms: u64,
}

pub struct Orchestrator {
    config: ScanConfig,
    launcher: Box<dyn EngineLauncher>,
    collector: PageSessionCollector,
}

impl Orchestrator {
    pub fn new(config: ScanConfig, launcher: impl EngineLauncher + 'static) -> Self {
        Self {
            config,
            launcher: Box::new(launcher),
            collector: PageSessionCollector::default(),
        }
    }

    pub fn with_collector(mut self, collector: PageSessionCollector) -> Self {
        self.collector = collector;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn run<S: EventSink + ?Sized>(&self, sink: &mut S) -> Result<RunSummary, ScanError> {
        let mut state = RunState::new();
        let engine = self.launcher.launch().await.map_err(ScanError::Launch)?;

        tracing::info!(
            run_id = %state.run_id,
            base_url = %self.config.base_url,
            max_pages = self.config.max_pages,
            concurrency = self.config.concurrency,
            "scan started"
        );

        // Page panics are contained per visit; this catches the rest (sink,
        // detection) so the engine is still closed before the panic resumes
        let outcome = AssertUnwindSafe(self.crawl(engine.as_ref(), &mut state, sink))
            .catch_unwind()
            .await;

        if let Err(e) = engine.close().await {
            tracing::warn!(error = %e, "failed to close page engine");
        }

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(SinkClosed)) => {
                tracing::info!(run_id = %state.run_id, "event consumer went away, scan cancelled");
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }

        let summary = state.summary();
        tracing::info!(
            run_id = %summary.run_id,
            pages = summary.pages_scanned,
            issues = summary.issues_found,
            critical = summary.critical_issues,
            duration_ms = summary.duration_ms,
            "scan finished"
        );
        Ok(summary)
    }

    async fn crawl<S: EventSink + ?Sized>(
        &self,
        engine: &dyn BrowserEngine,
        state: &mut RunState,
        sink: &mut S,
    ) -> Result<(), SinkClosed> {
        let mut emitter = Emitter::new(sink, self.config.progressive);
        let mut frontier = Frontier::new(self.config.base_url.as_str());
        let mut patterns = PatternTracker::new();
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0usize;
        let mut cancelled = false;

        emitter.emit(ScanEvent::ScanStart(ScanStart {
            run_id: state.run_id.clone(),
            base_url: self.config.base_url.to_string(),
            max_pages: self.config.max_pages,
            viewports: self.config.viewports.clone(),
            started_at: state.started_at,
        }))?;

        loop {
            // Fill free session slots, never going past the page budget
            while !cancelled
                && in_flight.len() < self.config.concurrency
                && dispatched < self.config.max_pages
            {
                let Some(url) = frontier.pop() else { break };
                if frontier.is_visited(&url) {
                    continue;
                }
                frontier.mark_visited(&url);
                dispatched += 1;

                if emitter.page(ScanEvent::PageScanResult(PageScanResult::scanning(&url))).is_err() {
                    cancelled = true;
                    break;
                }
                in_flight.push(self.visit_page(engine, url));
            }

            // Nothing in flight and nothing left to dispatch: done
            let Some((url, elapsed, outcome)) = in_flight.next().await else {
                break;
            };

            let issues = match &outcome {
                Ok(visit) => detect_issues(&visit.bundle),
                Err(_) => Vec::new(),
            };
            state.record_page(&issues);

            if cancelled {
                // Draining sessions that were already running
                continue;
            }

            let sent = match outcome {
                Ok(visit) => {
                    self.admit_links(&mut frontier, &visit.links);
                    if self.config.pattern_analysis {
                        patterns.observe(&url, &issues);
                    }
                    self.emit_page_complete(&mut emitter, visit, issues, elapsed)
                }
                Err(error) => {
                    tracing::warn!(url = %url, error = %error, "page scan failed");
                    emitter.page(ScanEvent::PageScanResult(PageScanResult::failed(
                        &url,
                        elapsed.as_millis() as u64,
                        error.to_string(),
                    )))
                }
            };

            let sent = sent.and_then(|()| {
                if !self.config.progressive {
                    return Ok(());
                }
                emitter.emit(ScanEvent::ScanProgress(ScanProgress {
                    pages_scanned: state.pages_scanned,
                    total_pages: frontier.estimated_total(),
                    issues_found: state.issues_found,
                    critical_issues: state.critical_issues,
                    current_url: url.clone(),
                }))
            });

            if sent.is_err() {
                cancelled = true;
            }
        }

        if cancelled {
            return Err(SinkClosed);
        }

        emitter.flush()?;

        if self.config.pattern_analysis {
            for analysis in patterns.into_analysis() {
                emitter.emit(ScanEvent::PatternAnalysis(analysis))?;
            }
        }

        emitter.emit(ScanEvent::ScanComplete(ScanComplete {
            run_id: state.run_id.clone(),
            total_pages: state.pages_scanned,
            total_issues: state.issues_found,
            critical_issues: state.critical_issues,
            duration_ms: state.elapsed_ms(),
            completed_at: Utc::now(),
        }))
    }

    async fn visit_page(
        &self,
        engine: &dyn BrowserEngine,
        url: String,
    ) -> (String, Duration, Result<PageVisit, EngineError>) {
        let started = Instant::now();
        // Covers new_page and page close too; collect() is guarded inside visit()
        let outcome = contain_panic(self.collector.visit(&url, &self.config, engine)).await;
        (url, started.elapsed(), outcome)
    }

    // Queues every discovered link that is same-origin, allowed by the
    // include/exclude patterns, and not already visited or queued
    fn admit_links(&self, frontier: &mut Frontier, links: &[String]) {
        for link in links {
            let Some(url) = normalize_link(link) else {
                tracing::debug!(link = %link, "dropping malformed link");
                continue;
            };
            if !same_origin(&self.config.base_url, &url) {
                continue;
            }
            let url = String::from(url);
            if !self.config.url_filter.allows(&url) {
                tracing::debug!(url = %url, "link rejected by url patterns");
                continue;
            }
            if frontier.enqueue(url.clone()) {
                tracing::debug!(url = %url, "queued");
            }
        }
    }

    fn emit_page_complete<S: EventSink + ?Sized>(
        &self,
        emitter: &mut Emitter<'_, S>,
        visit: PageVisit,
        issues: Vec<Issue>,
        elapsed: Duration,
    ) -> Result<(), SinkClosed> {
        let bundle = visit.bundle;
        let page = ScanEvent::PageScanResult(PageScanResult::complete(
            &bundle.url,
            bundle.status,
            elapsed.as_millis() as u64,
            issues.len(),
            bundle.screenshots,
        ));

        if self.config.progressive && self.config.prioritize_critical {
            let (critical, rest): (Vec<Issue>, Vec<Issue>) = issues
                .into_iter()
                .partition(|issue| issue.severity == Severity::Critical);
            for issue in critical {
                emitter.page(ScanEvent::Issue(issue))?;
            }
            emitter.page(page)?;
            for issue in rest {
                emitter.page(ScanEvent::Issue(issue))?;
            }
        } else {
            emitter.page(page)?;
            for issue in issues {
                emitter.page(ScanEvent::Issue(issue))?;
            }
        }
        Ok(())
    }
}

// Sends events to the sink. Outside progressive mode, page and issue events
// are held back and released together when the crawl loop ends.
struct Emitter<'s, S: EventSink + ?Sized> {
    sink: &'s mut S,
    held: Option<Vec<ScanEvent>>,
}

impl<'s, S: EventSink + ?Sized> Emitter<'s, S> {
    fn new(sink: &'s mut S, progressive: bool) -> Self {
        Self {
            sink,
            held: (!progressive).then(Vec::new),
        }
    }

    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        self.sink.emit(event)
    }

    fn page(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        match &mut self.held {
            Some(held) => {
                held.push(event);
                Ok(())
            }
            None => self.sink.emit(event),
        }
    }

    fn flush(&mut self) -> Result<(), SinkClosed> {
        for event in self.held.take().unwrap_or_default() {
            self.sink.emit(event)?;
        }
        Ok(())
    }
}
