// src/checker/mod.rs
// =============================================================================
// Turns the raw signals collected for one page into a list of issues.
//
// detect_issues() is a pure function: the same SignalBundle always produces
// the same issues (ids included), in this fixed order:
//   1. one issue per console entry of type "error"
//   2. one issue per failed network request
//   3. performance issues, when metrics were captured
//   4. one broken-link issue when the page itself returned >= 400
//
// Submodules:
// - console: keyword severity tiers and source location extraction
// - network: network failure and page status classification
// - performance: load time and LCP thresholds
// - fixes: the ordered fix-suggestion rule table
// =============================================================================

mod console;
mod fixes;
mod network;
mod performance;

pub use console::console_severity;
pub use fixes::{matching_rule, suggest_fix, FixRule, FIX_RULES};
pub use network::network_severity;

use uuid::Uuid;

use crate::model::{Issue, IssueCategory, Severity, SignalBundle};

pub fn detect_issues(bundle: &SignalBundle) -> Vec<Issue> {
    let mut builder = IssueBuilder::new(bundle);

    for entry in bundle.console.iter().filter(|entry| entry.is_error()) {
        let location = console::source_location(entry);
        let fix_suggestion = suggest_fix(&entry.text);
        builder.push(Issue {
            severity: console_severity(&entry.text),
            category: IssueCategory::ConsoleError,
            file: location.file,
            line: location.line,
            column: location.column,
            message: console::headline(&entry.text).to_string(),
            stack_trace: console::stack_trace(&entry.text),
            auto_fixable: fix_suggestion
                .as_ref()
                .map(|fix| fix.is_auto_fixable())
                .unwrap_or(false),
            fix_suggestion,
            ..builder.blank()
        });
    }

    for request in bundle.network.iter().filter(|request| request.failed) {
        builder.push(Issue {
            severity: network_severity(request.status),
            category: IssueCategory::NetworkFailure,
            message: network::network_message(request),
            ..builder.blank()
        });
    }

    if let Some(metrics) = &bundle.performance {
        for finding in performance::performance_findings(metrics) {
            builder.push(Issue {
                severity: finding.severity,
                category: IssueCategory::Performance,
                message: finding.message,
                ..builder.blank()
            });
        }
    }

    if network::is_broken_page(bundle.status) {
        builder.push(Issue {
            severity: Severity::Medium,
            category: IssueCategory::BrokenLink,
            message: network::broken_page_message(&bundle.url, bundle.status),
            ..builder.blank()
        });
    }

    builder.finish()
}

// Stamps every issue of a page with the page URL, capture time and an id
// derived from (url, capture time, position) so detection stays deterministic
struct IssueBuilder<'a> {
    bundle: &'a SignalBundle,
    issues: Vec<Issue>,
}

impl<'a> IssueBuilder<'a> {
    fn new(bundle: &'a SignalBundle) -> Self {
        Self {
            bundle,
            issues: Vec::new(),
        }
    }

    fn blank(&self) -> Issue {
        let seed = format!(
            "{}|{}|{}",
            self.bundle.url,
            self.bundle.captured_at.timestamp_millis(),
            self.issues.len()
        );
        Issue {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string(),
            severity: Severity::Info,
            category: IssueCategory::ConsoleError,
            url: self.bundle.url.clone(),
            file: None,
            line: None,
            column: None,
            message: String::new(),
            stack_trace: None,
            snippet: None,
            fix_suggestion: None,
            auto_fixable: false,
            created_at: self.bundle.captured_at,
        }
    }

    fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    fn finish(self) -> Vec<Issue> {
        self.issues
    }
}
