// src/crawl/patterns.rs
// =============================================================================
// Spots issues that repeat across pages.
//
// Each issue is reduced to a fingerprint: its category plus its message with
// URLs replaced by <url> and numbers by <n>, lower-cased. Fingerprints seen
// on two or more different pages are reported once the crawl is over, most
// frequent first. Only fingerprints and page URLs are kept, never signals.
// =============================================================================

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::model::{Issue, IssueCategory, PatternAnalysis, Severity};

static URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s'\x22)]+").expect("valid regex"));
static NUMBERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

pub fn fingerprint(message: &str) -> String {
    let without_urls = URLS.replace_all(message, "<url>");
    let without_numbers = NUMBERS.replace_all(&without_urls, "<n>");
    without_numbers.to_lowercase()
}

struct PatternGroup {
    pattern: String,
    category: IssueCategory,
    severity: Severity,
    occurrences: usize,
    pages: Vec<String>,
}

#[derive(Default)]
pub struct PatternTracker {
    groups: Vec<PatternGroup>,
    index: HashMap<(IssueCategory, String), usize>,
}

impl PatternTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, page_url: &str, issues: &[Issue]) {
        for issue in issues {
            let pattern = fingerprint(&issue.message);
            let key = (issue.category, pattern.clone());
            let position = *self.index.entry(key).or_insert_with(|| {
                self.groups.push(PatternGroup {
                    pattern,
                    category: issue.category,
                    severity: issue.severity,
                    occurrences: 0,
                    pages: Vec::new(),
                });
                self.groups.len() - 1
            });

            let group = &mut self.groups[position];
            group.occurrences += 1;
            group.severity = group.severity.max(issue.severity);
            if !group.pages.iter().any(|p| p == page_url) {
                group.pages.push(page_url.to_string());
            }
        }
    }

    // Patterns seen on at least two pages, most frequent first
    pub fn into_analysis(self) -> Vec<PatternAnalysis> {
        let mut recurring: Vec<PatternGroup> = self
            .groups
            .into_iter()
            .filter(|group| group.pages.len() >= 2)
            .collect();
        // stable sort keeps first-seen order among equal counts
        recurring.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

        recurring
            .into_iter()
            .map(|group| PatternAnalysis {
                pattern: group.pattern,
                category: group.category,
                severity: group.severity,
                occurrences: group.occurrences,
                affected_pages: group.pages,
            })
            .collect()
    }
}
