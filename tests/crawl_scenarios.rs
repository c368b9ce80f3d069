// tests/crawl_scenarios.rs
// =============================================================================
// End-to-end crawl behavior against the scripted engine in tests/common.
// =============================================================================

mod common;

use futures::StreamExt;
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::time::Duration;

use common::{options, orchestrator, orchestrator_with, pages_with, EngineLog, PageScript, Site, BASE};
use site_sentry::config::Viewport;
use site_sentry::crawl::{scan_stream, PageSessionCollector};
use site_sentry::engine::RouteDecision;
use site_sentry::model::{IssueCategory, PageStatus, ScanEvent, Severity};
use site_sentry::output::{EventFilter, Reporter};
use site_sentry::ScanError;

fn kinds(events: &[ScanEvent]) -> Vec<&'static str> {
    events.iter().map(ScanEvent::kind).collect()
}

#[tokio::test]
async fn test_critical_issue_precedes_page_completion() {
    let home = PageScript::default()
        .console_error("Uncaught TypeError: Cannot read properties of undefined (reading 'map')")
        .failed_request("https://site.test/a.js", 404)
        .failed_request("https://site.test/b.js", 404);
    let (launcher, _engine_log) = Site::new().page(BASE, home).launcher();

    let mut events = Vec::new();
    let summary = orchestrator(options(), launcher).run(&mut events).await.unwrap();

    assert_eq!(
        kinds(&events),
        vec![
            "scan_start",
            "page_scan_result",
            "issue",
            "page_scan_result",
            "issue",
            "issue",
            "scan_progress",
            "scan_complete",
        ]
    );
    assert_eq!(events[2].as_issue().unwrap().severity, Severity::Critical);
    assert_eq!(events[3].as_page().unwrap().status, PageStatus::Complete);
    assert_eq!(events[3].as_page().unwrap().issue_count, Some(3));
    assert_eq!(events[4].as_issue().unwrap().severity, Severity::Medium);
    assert_eq!(events[5].as_issue().unwrap().severity, Severity::Medium);

    assert_eq!(summary.pages_scanned, 1);
    assert_eq!(summary.issues_found, 3);
    assert_eq!(summary.critical_issues, 1);
    let ScanEvent::ScanComplete(done) = events.last().unwrap() else {
        panic!("last event must be scan_complete");
    };
    assert_eq!(done.total_issues, 3);
    assert_eq!(done.critical_issues, 1);
}

#[tokio::test]
async fn test_critical_issues_follow_page_when_not_prioritized() {
    let home = PageScript::default().console_error("Uncaught Error: boom");
    let (launcher, _engine_log) = Site::new().page(BASE, home).launcher();

    let mut opts = options();
    opts.prioritize_critical = Some(false);
    let mut events = Vec::new();
    orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert_eq!(
        kinds(&events),
        vec!["scan_start", "page_scan_result", "page_scan_result", "issue", "scan_progress", "scan_complete"]
    );
}

#[tokio::test]
async fn test_each_url_scanned_once() {
    let site = Site::new()
        .page(
            BASE,
            PageScript::links(&[
                "https://site.test/a",
                "https://site.test/b",
                "https://site.test/a#pricing",
                BASE,
            ]),
        )
        .page("https://site.test/a", PageScript::links(&["https://site.test/b", BASE]))
        .page("https://site.test/b", PageScript::links(&["https://site.test/a"]));
    let (launcher, engine_log) = site.launcher();

    let mut events = Vec::new();
    let summary = orchestrator(options(), launcher).run(&mut events).await.unwrap();

    assert_eq!(
        engine_log.navigations(),
        vec![BASE, "https://site.test/a", "https://site.test/b"]
    );
    assert_eq!(pages_with(&events, PageStatus::Scanning).len(), 3);
    assert_eq!(pages_with(&events, PageStatus::Complete).len(), 3);
    assert_eq!(summary.pages_scanned, 3);
}

#[tokio::test]
async fn test_max_pages_bounds_the_crawl() {
    let links: Vec<String> = (0..10).map(|i| format!("https://site.test/p{i}")).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let (launcher, engine_log) = Site::new().page(BASE, PageScript::links(&link_refs)).launcher();

    let mut opts = options();
    opts.max_pages = Some(4);
    opts.concurrency = Some(3);
    let mut events = Vec::new();
    let summary = orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert_eq!(summary.pages_scanned, 4);
    assert_eq!(engine_log.navigations().len(), 4);
    assert_eq!(pages_with(&events, PageStatus::Scanning).len(), 4);
}

#[tokio::test]
async fn test_navigation_failure_is_contained() {
    let site = Site::new()
        .page(
            BASE,
            PageScript::links(&["https://site.test/broken", "https://site.test/ok"]),
        )
        .page(
            "https://site.test/broken",
            PageScript::navigation_error("net::ERR_CONNECTION_RESET"),
        )
        .page("https://site.test/ok", PageScript::default());
    let (launcher, engine_log) = site.launcher();

    let mut events = Vec::new();
    let summary = orchestrator(options(), launcher).run(&mut events).await.unwrap();

    assert_eq!(pages_with(&events, PageStatus::Failed), vec!["https://site.test/broken"]);
    assert_eq!(
        pages_with(&events, PageStatus::Complete),
        vec![BASE, "https://site.test/ok"]
    );
    let failed = events
        .iter()
        .filter_map(ScanEvent::as_page)
        .find(|page| page.status == PageStatus::Failed)
        .unwrap();
    assert!(failed.error.as_deref().unwrap().contains("ERR_CONNECTION_RESET"));
    assert!(events
        .iter()
        .filter_map(ScanEvent::as_issue)
        .all(|issue| issue.url != "https://site.test/broken"));

    assert_eq!(summary.pages_scanned, 3);
    assert_eq!(events.last().unwrap().kind(), "scan_complete");
    assert_eq!(
        EngineLog::count(&engine_log.pages_opened),
        EngineLog::count(&engine_log.pages_closed)
    );
}

#[tokio::test]
async fn test_launch_failure_is_fatal() {
    let (launcher, engine_log) = Site::new().failing_launch().launcher();

    let mut events = Vec::new();
    let result = orchestrator(options(), launcher).run(&mut events).await;

    assert!(matches!(result, Err(ScanError::Launch(_))));
    assert!(events.is_empty());
    assert_eq!(EngineLog::count(&engine_log.engine_closes), 0);
}

#[tokio::test]
async fn test_engine_closed_exactly_once() {
    let site = Site::new()
        .page(BASE, PageScript::links(&["https://site.test/gone"]))
        .page("https://site.test/gone", PageScript::navigation_error("timeout"));
    let (launcher, engine_log) = site.launcher();

    let mut events = Vec::new();
    orchestrator(options(), launcher).run(&mut events).await.unwrap();

    assert_eq!(EngineLog::count(&engine_log.launches), 1);
    assert_eq!(EngineLog::count(&engine_log.engine_closes), 1);
}

#[tokio::test]
async fn test_non_progressive_run_batches_events() {
    let site = Site::new()
        .page(
            BASE,
            PageScript::links(&["https://site.test/a"]).console_error("Uncaught Error: boom"),
        )
        .page("https://site.test/a", PageScript::default());
    let (launcher, _engine_log) = site.launcher();

    let mut opts = options();
    opts.progressive = Some(false);
    let mut events = Vec::new();
    orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert!(events.iter().all(|e| !matches!(e, ScanEvent::ScanProgress(_))));
    assert_eq!(
        kinds(&events),
        vec![
            "scan_start",
            "page_scan_result",
            "page_scan_result",
            "issue",
            "page_scan_result",
            "page_scan_result",
            "scan_complete",
        ]
    );
    // without progressive delivery the page completes before its issues
    assert_eq!(events[2].as_page().unwrap().status, PageStatus::Complete);
}

#[tokio::test]
async fn test_concurrent_sessions_respect_limit_and_ordering() {
    let links: Vec<String> = (0..6).map(|i| format!("https://site.test/p{i}")).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let mut site = Site::new()
        .page(BASE, PageScript::links(&link_refs))
        .latency(Duration::from_millis(20));
    for link in &links {
        site = site.page(link, PageScript::default().console_error("Error: widget failed"));
    }
    let (launcher, engine_log) = site.launcher();

    let mut opts = options();
    opts.concurrency = Some(3);
    let mut events = Vec::new();
    let summary = orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert_eq!(EngineLog::count(&engine_log.max_in_flight), 3);
    assert_eq!(summary.pages_scanned, 7);

    let navigations = engine_log.navigations();
    let unique: HashSet<&String> = navigations.iter().collect();
    assert_eq!(unique.len(), navigations.len());

    // every page: scanning first, then exactly one terminal event, and its
    // issues only after it started
    let mut started = HashSet::new();
    let mut finished = HashSet::new();
    for event in &events {
        match event {
            ScanEvent::PageScanResult(page) if page.status == PageStatus::Scanning => {
                assert!(started.insert(page.url.clone()));
            }
            ScanEvent::PageScanResult(page) => {
                assert!(started.contains(&page.url));
                assert!(finished.insert(page.url.clone()));
            }
            ScanEvent::Issue(issue) => assert!(started.contains(&issue.url)),
            _ => {}
        }
    }
    assert_eq!(finished.len(), 7);

    // progress counters never go backwards
    let progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::ScanProgress(p) => Some((p.pages_scanned, p.issues_found)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 7);
    assert!(progress.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 <= w[1].1));
}

#[tokio::test]
async fn test_dropping_stream_cancels_run() {
    let links: Vec<String> = (0..20).map(|i| format!("https://site.test/p{i}")).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let site = Site::new()
        .page(BASE, PageScript::links(&link_refs))
        .latency(Duration::from_millis(10));
    let (launcher, engine_log) = site.launcher();

    let mut stream = scan_stream(orchestrator(options(), launcher));
    let first = stream.next().await.unwrap();
    assert_eq!(first.kind(), "scan_start");
    let second = stream.next().await.unwrap();
    assert_eq!(second.as_page().unwrap().status, PageStatus::Scanning);

    let summary = stream.finish().await.unwrap();

    assert!(summary.pages_scanned < 21);
    assert!(engine_log.navigations().len() < 21);
    assert_eq!(EngineLog::count(&engine_log.engine_closes), 1);
    assert_eq!(
        EngineLog::count(&engine_log.pages_opened),
        EngineLog::count(&engine_log.pages_closed)
    );
}

#[tokio::test]
async fn test_stream_delivers_full_run() {
    let site = Site::new().page(BASE, PageScript::links(&["https://site.test/a"]));
    let (launcher, _engine_log) = site.launcher();

    let events: Vec<ScanEvent> = scan_stream(orchestrator(options(), launcher)).collect().await;

    assert_eq!(events.first().unwrap().kind(), "scan_start");
    assert_eq!(events.last().unwrap().kind(), "scan_complete");
    assert_eq!(pages_with(&events, PageStatus::Complete).len(), 2);
}

#[tokio::test]
async fn test_recurring_issue_reported_before_completion() {
    let crash = "Uncaught ReferenceError: analytics is not defined";
    let site = Site::new()
        .page(
            BASE,
            PageScript::links(&["https://site.test/a", "https://site.test/b"]).console_error(crash),
        )
        .page("https://site.test/a", PageScript::default().console_error(crash))
        .page("https://site.test/b", PageScript::default().console_error(crash).slow(6_000));
    let (launcher, _engine_log) = site.launcher();

    let mut events = Vec::new();
    orchestrator(options(), launcher).run(&mut events).await.unwrap();

    let n = events.len();
    assert_eq!(events[n - 1].kind(), "scan_complete");
    let ScanEvent::PatternAnalysis(pattern) = &events[n - 2] else {
        panic!("pattern analysis must precede scan_complete");
    };
    assert_eq!(pattern.category, IssueCategory::ConsoleError);
    assert_eq!(pattern.occurrences, 3);
    assert_eq!(pattern.affected_pages.len(), 3);
    assert_eq!(pattern.severity, Severity::Critical);

    // the slow page is a one-off, so it is not a pattern
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ScanEvent::PatternAnalysis(_)))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_only_same_origin_allowed_links_are_followed() {
    let site = Site::new().page(
        BASE,
        PageScript::links(&[
            "https://other.test/x",
            "http://site.test/insecure",
            "https://site.test/admin/panel",
            "https://site.test/ok",
            "mailto:team@site.test",
            "not a url",
        ]),
    );
    let (launcher, engine_log) = site.launcher();

    let mut opts = options();
    opts.exclude_patterns = Some(vec!["*/admin/*".into()]);
    let mut events = Vec::new();
    orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert_eq!(engine_log.navigations(), vec![BASE, "https://site.test/ok"]);
}

#[tokio::test]
async fn test_missing_page_reported_as_broken_link() {
    let site = Site::new().page(BASE, PageScript::links(&["https://site.test/missing"]));
    let (launcher, _engine_log) = site.launcher();

    let mut events = Vec::new();
    orchestrator(options(), launcher).run(&mut events).await.unwrap();

    let broken: Vec<_> = events
        .iter()
        .filter_map(ScanEvent::as_issue)
        .filter(|issue| issue.category == IssueCategory::BrokenLink)
        .collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].url, "https://site.test/missing");
    assert_eq!(broken[0].severity, Severity::Medium);
}

#[tokio::test]
async fn test_reporter_writes_filtered_stream_to_file() {
    let site = Site::new().page(
        BASE,
        PageScript::default()
            .console_error("Uncaught TypeError: x is undefined")
            .failed_request("https://site.test/missing.css", 404),
    );
    let (launcher, _engine_log) = site.launcher();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.jsonl");
    let file = std::fs::File::create(&path).unwrap();
    let mut reporter = Reporter::new(EventFilter {
        critical_only: true,
        min_severity: None,
    })
    .with_jsonl(Box::new(file));

    let summary = orchestrator(options(), launcher).run(&mut reporter).await.unwrap();
    assert!(reporter.take_failure().is_none());
    drop(reporter);

    let records: Vec<ScanEvent> = BufReader::new(std::fs::File::open(&path).unwrap())
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect();

    let issues: Vec<_> = records.iter().filter_map(ScanEvent::as_issue).collect();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Critical);
    // the summary keeps unfiltered counts
    assert_eq!(summary.issues_found, 2);
    assert_eq!(records.last().unwrap().kind(), "scan_complete");
}

#[tokio::test]
async fn test_panicking_page_fails_alone() {
    let site = Site::new()
        .page(BASE, PageScript::links(&["https://site.test/bad", "https://site.test/ok"]))
        .page("https://site.test/bad", PageScript::default().panicking())
        .page("https://site.test/ok", PageScript::default());
    let (launcher, engine_log) = site.launcher();

    let mut events = Vec::new();
    let summary = orchestrator(options(), launcher).run(&mut events).await.unwrap();

    assert_eq!(pages_with(&events, PageStatus::Failed), vec!["https://site.test/bad"]);
    let failed = events
        .iter()
        .filter_map(ScanEvent::as_page)
        .find(|page| page.status == PageStatus::Failed)
        .unwrap();
    assert!(failed.error.as_deref().unwrap().contains("panicked"));

    assert_eq!(
        pages_with(&events, PageStatus::Complete),
        vec![BASE, "https://site.test/ok"]
    );
    assert_eq!(events.last().unwrap().kind(), "scan_complete");
    assert_eq!(summary.pages_scanned, 3);
    assert_eq!(
        EngineLog::count(&engine_log.pages_opened),
        EngineLog::count(&engine_log.pages_closed)
    );
    assert_eq!(EngineLog::count(&engine_log.engine_closes), 1);
}

#[tokio::test]
async fn test_screenshot_taken_per_viewport() {
    let (launcher, engine_log) = Site::new().page(BASE, PageScript::default()).launcher();
    let dir = tempfile::tempdir().unwrap();

    let mut opts = options();
    opts.screenshots = Some(true);
    opts.viewports = Some(vec![Viewport::Mobile, Viewport::Tablet]);
    opts.screenshot_dir = Some(dir.path().join("shots"));
    let mut events = Vec::new();
    orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert_eq!(engine_log.viewports(), vec![(375, 667), (768, 1024)]);

    let page = events
        .iter()
        .filter_map(ScanEvent::as_page)
        .find(|page| page.status == PageStatus::Complete)
        .unwrap();
    let taken: Vec<_> = page
        .screenshots
        .iter()
        .map(|shot| (shot.viewport, shot.width, shot.height))
        .collect();
    assert_eq!(
        taken,
        vec![(Viewport::Mobile, 375, 667), (Viewport::Tablet, 768, 1024)]
    );

    let written = engine_log.screenshots();
    assert_eq!(written.len(), 2);
    for (shot, path) in page.screenshots.iter().zip(&written) {
        assert_eq!(&shot.path, path);
        assert!(path.starts_with(dir.path().join("shots")));
        assert!(path.exists());
    }
}

#[tokio::test]
async fn test_external_requests_blocked_except_allowed_domains() {
    let home = PageScript::default()
        .failed_request("https://tracker.other.test/pixel.js", 500)
        .failed_request("https://cdn.partner.test/lib.js", 404)
        .failed_request("https://site.test/own.js", 404);
    let (launcher, engine_log) = Site::new().page(BASE, home).launcher();

    let mut opts = options();
    opts.block_external = Some(true);
    opts.allowed_domains = Some(vec!["cdn.partner.test".into()]);
    let mut events = Vec::new();
    orchestrator(opts, launcher).run(&mut events).await.unwrap();

    assert_eq!(EngineLog::count(&engine_log.routes_installed), 1);
    assert_eq!(
        engine_log.routed(),
        vec![
            ("https://tracker.other.test/pixel.js".to_string(), RouteDecision::Abort),
            ("https://cdn.partner.test/lib.js".to_string(), RouteDecision::Continue),
            ("https://site.test/own.js".to_string(), RouteDecision::Continue),
        ]
    );

    let failures: Vec<_> = events
        .iter()
        .filter_map(ScanEvent::as_issue)
        .filter(|issue| issue.category == IssueCategory::NetworkFailure)
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|issue| !issue.message.contains("tracker.other.test")));
}

#[tokio::test]
async fn test_no_route_handler_without_blocking() {
    let home = PageScript::default()
        .failed_request("https://tracker.other.test/pixel.js", 500)
        .failed_request("https://cdn.partner.test/lib.js", 404)
        .failed_request("https://site.test/own.js", 404);
    let (launcher, engine_log) = Site::new().page(BASE, home).launcher();

    let mut events = Vec::new();
    orchestrator(options(), launcher).run(&mut events).await.unwrap();

    assert_eq!(EngineLog::count(&engine_log.routes_installed), 0);
    let failures = events
        .iter()
        .filter_map(ScanEvent::as_issue)
        .filter(|issue| issue.category == IssueCategory::NetworkFailure)
        .count();
    assert_eq!(failures, 3);
}

#[tokio::test]
async fn test_slow_navigation_times_out_as_page_failure() {
    let site = Site::new()
        .page(BASE, PageScript::default())
        .latency(Duration::from_millis(200));
    let (launcher, engine_log) = site.launcher();

    let collector = PageSessionCollector::new().with_navigation_timeout(Duration::from_millis(20));
    let mut events = Vec::new();
    let summary = orchestrator_with(options(), launcher, collector)
        .run(&mut events)
        .await
        .unwrap();

    assert_eq!(pages_with(&events, PageStatus::Failed), vec![BASE]);
    let failed = events.iter().filter_map(ScanEvent::as_page).last().unwrap();
    assert!(failed.error.as_deref().unwrap().contains("timed out after 20ms"));
    assert_eq!(summary.pages_scanned, 1);
    assert_eq!(EngineLog::count(&engine_log.pages_closed), 1);
}
