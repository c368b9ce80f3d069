// src/lib.rs
// =============================================================================
// site-sentry: crawls a website, watches every page load, and reports the
// errors it finds together with suggested fixes.
//
// Modules:
// - model/    the records a scan produces (issues, signals, events)
// - checker/  turns a page's signals into issues, with fix suggestions
// - engine/   the page-automation contract and an HTTP-only engine
// - crawl/    frontier, page sessions and the orchestrator loop
// - config    configuration layers and the resolved ScanConfig
// - output/   filters, JSON Lines and terminal rendering
// - error     error types shared by the above
// =============================================================================

pub mod checker;
pub mod config;
pub mod crawl;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;

pub use config::{ScanConfig, ScanOptions};
pub use crawl::{scan_stream, EventSink, Orchestrator, RunSummary, ScanStream};
pub use error::{ConfigError, EngineError, ScanError};
pub use model::{Issue, ScanEvent, Severity};
