// src/model/event.rs
// =============================================================================
// The event stream is the only thing a scan produces.
//
// Every record a consumer sees is one ScanEvent variant. The variants are a
// closed set, serialized with a "type" tag so each line of the output stream
// can be routed without guessing at its shape.
//
// Ordering rules (what comes before what) live in crawl/orchestrator.rs.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::{Issue, IssueCategory, Severity};
use super::signals::Screenshot;
use crate::config::Viewport;

// Lifecycle of one page: Scanning -> Complete | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Scanning,
    Complete,
    Failed,
}

impl PageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PageStatus::Scanning)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageScanResult {
    pub url: String,
    pub status: PageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<Screenshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PageScanResult {
    pub fn scanning(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: PageStatus::Scanning,
            http_status: None,
            duration_ms: None,
            issue_count: None,
            screenshots: Vec::new(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn complete(
        url: impl Into<String>,
        http_status: u16,
        duration_ms: u64,
        issue_count: usize,
        screenshots: Vec<Screenshot>,
    ) -> Self {
        Self {
            status: PageStatus::Complete,
            http_status: Some(http_status),
            duration_ms: Some(duration_ms),
            issue_count: Some(issue_count),
            screenshots,
            ..Self::scanning(url)
        }
    }

    pub fn failed(url: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            status: PageStatus::Failed,
            duration_ms: Some(duration_ms),
            error: Some(error.into()),
            ..Self::scanning(url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStart {
    pub run_id: String,
    pub base_url: String,
    pub max_pages: usize,
    pub viewports: Vec<Viewport>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub pages_scanned: usize,
    /// visited + queued; grows as links are discovered
    pub total_pages: usize,
    pub issues_found: usize,
    pub critical_issues: usize,
    pub current_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanComplete {
    pub run_id: String,
    pub total_pages: usize,
    pub total_issues: usize,
    pub critical_issues: usize,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

// An issue shape that recurred across several pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub pattern: String,
    pub category: IssueCategory,
    pub severity: Severity,
    pub occurrences: usize,
    pub affected_pages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    ScanStart(ScanStart),
    ScanProgress(ScanProgress),
    PageScanResult(PageScanResult),
    Issue(Issue),
    ScanComplete(ScanComplete),
    PatternAnalysis(PatternAnalysis),
}

impl ScanEvent {
    // Short name used in logs and the terminal reporter
    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::ScanStart(_) => "scan_start",
            ScanEvent::ScanProgress(_) => "scan_progress",
            ScanEvent::PageScanResult(_) => "page_scan_result",
            ScanEvent::Issue(_) => "issue",
            ScanEvent::ScanComplete(_) => "scan_complete",
            ScanEvent::PatternAnalysis(_) => "pattern_analysis",
        }
    }

    pub fn as_issue(&self) -> Option<&Issue> {
        match self {
            ScanEvent::Issue(issue) => Some(issue),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&PageScanResult> {
        match self {
            ScanEvent::PageScanResult(page) => Some(page),
            _ => None,
        }
    }
}
