// src/crawl/queue.rs
// =============================================================================
// The crawl frontier: pages we know about but haven't visited yet.
//
// How it works:
// 1. Start with the base URL in the queue
// 2. Pop the oldest URL (breadth-first, FIFO)
// 3. Mark it visited before the page is opened
// 4. Links found on the page are pushed to the back of the queue
//
// Invariants:
// - a URL is queued at most once until it has been popped
// - a URL that has been visited is never queued again
// - the visited set only grows
//
// Rust concepts:
// - HashSet: To track visited and queued URLs (O(1) lookup)
// - VecDeque: Double-ended queue for breadth-first crawling
// =============================================================================

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(seed: impl Into<String>) -> Self {
        let mut frontier = Self::default();
        frontier.enqueue(seed);
        frontier
    }

    // Adds a URL to the back of the queue unless it was already seen.
    // Returns true if the URL was added.
    pub fn enqueue(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.visited.contains(&url) || self.queued.contains(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.queue.push_back(url);
        true
    }

    pub fn pop(&mut self) -> Option<String> {
        let url = self.queue.pop_front()?;
        self.queued.remove(&url);
        Some(url)
    }

    // Returns false if the URL had already been visited
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    // visited + queued, the denominator shown in progress events
    pub fn estimated_total(&self) -> usize {
        self.visited.len() + self.queue.len()
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why track `queued` separately from the VecDeque?
//    - VecDeque::contains is a linear scan
//    - A page linked from every other page would be scanned for on each visit
//    - The extra HashSet keeps the duplicate check O(1)
//
// 2. Why does pop() not mark the URL visited?
//    - The orchestrator decides when a URL counts as visited
//    - It checks is_visited() first, so a URL that somehow got queued twice
//      is skipped without being counted
// -----------------------------------------------------------------------------
