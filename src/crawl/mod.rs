// src/crawl/mod.rs
// =============================================================================
// This module runs a scan over a website.
//
// Features:
// - Breadth-first crawling starting from the base URL
// - Same-origin restriction (external links are never queued)
// - Include/exclude URL patterns
// - A hard cap on the number of pages visited
// - One page session per URL, with failures contained to that page
// - Events delivered in order to a sink, or as a Stream
//
// Layout:
// - queue.rs        the frontier (queued + visited URLs)
// - filter.rs       which discovered links may be queued
// - session.rs      visiting one page and collecting its signals
// - patterns.rs     issues that repeat across pages
// - sink.rs         where events go
// - orchestrator.rs the loop that ties it all together
// =============================================================================

mod filter;
mod orchestrator;
mod patterns;
mod queue;
mod session;
mod sink;

pub use filter::{glob_to_regex, normalize_link, same_origin, UrlFilter};
pub use orchestrator::{Orchestrator, RunState, RunSummary};
pub use patterns::{fingerprint, PatternTracker};
pub use queue::Frontier;
pub use session::{
    route_decision, screenshot_file_name, PageSessionCollector, PageVisit, NAVIGATION_TIMEOUT,
    SETTLE_DELAY,
};
pub use sink::{EventSink, FnSink};

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::ScanError;
use crate::model::ScanEvent;

// Runs the scan on its own task and hands back its events as a Stream.
//
// Dropping the stream (or calling finish() early) cancels the scan: the next
// event the orchestrator tries to send fails, no new pages are started, and
// the engine is closed.
pub fn scan_stream(orchestrator: Orchestrator) -> ScanStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut tx = tx;
        orchestrator.run(&mut tx).await
    });

    ScanStream {
        events: UnboundedReceiverStream::new(rx),
        task,
    }
}

pub struct ScanStream {
    events: UnboundedReceiverStream<ScanEvent>,
    task: JoinHandle<Result<RunSummary, ScanError>>,
}

impl ScanStream {
    // Stops listening and waits for the scan task to wind down
    pub async fn finish(self) -> Result<RunSummary, ScanError> {
        drop(self.events);
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ScanError::Cancelled),
        }
    }
}

impl Stream for ScanStream {
    type Item = ScanEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why an unbounded channel?
//    - The orchestrator emits from inside its crawl loop and must not stall
//      while page sessions are in flight
//    - Events are small; a page yields a handful of them at most
//
// 2. Two ways to consume a scan:
//    - Orchestrator::run(&mut sink) for callers that want a callback-style
//      sink (the CLI reporter, tests collecting into a Vec)
//    - scan_stream() for callers that want to pull events lazily
// -----------------------------------------------------------------------------
