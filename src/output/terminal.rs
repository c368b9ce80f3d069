// src/output/terminal.rs
// =============================================================================
// Human-readable scan output.
//
// One line per page and per issue, recurring patterns at the end, then a
// summary block. Written to stderr by default so stdout can carry the JSONL
// stream at the same time.
// =============================================================================

use std::io::{self, Stderr, Write};

use crate::model::{Issue, PageScanResult, PageStatus, ScanEvent, Severity};

// Longest URL shown before it gets truncated
const URL_WIDTH: usize = 70;

pub struct TerminalReporter<W: Write = Stderr> {
    out: W,
}

impl TerminalReporter<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> TerminalReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn handle(&mut self, event: &ScanEvent) -> io::Result<()> {
        match event {
            ScanEvent::ScanStart(start) => {
                let viewports: Vec<String> =
                    start.viewports.iter().map(|v| v.to_string()).collect();
                writeln!(
                    self.out,
                    "🔍 Scanning {} (up to {} pages, viewports: {})\n",
                    start.base_url,
                    start.max_pages,
                    viewports.join(", ")
                )
            }
            ScanEvent::PageScanResult(page) => self.page_line(page),
            ScanEvent::Issue(issue) => self.issue_line(issue),
            // The terminal shows pages as they finish; counts come in the summary
            ScanEvent::ScanProgress(_) => Ok(()),
            ScanEvent::PatternAnalysis(pattern) => writeln!(
                self.out,
                "🔁 Recurring {} ({}): \"{}\" seen {} times on {} pages",
                pattern.category,
                pattern.severity,
                pattern.pattern,
                pattern.occurrences,
                pattern.affected_pages.len()
            ),
            ScanEvent::ScanComplete(done) => {
                writeln!(self.out)?;
                writeln!(self.out, "📊 Summary:")?;
                writeln!(self.out, "   📄 Pages scanned: {}", done.total_pages)?;
                writeln!(self.out, "   ⚠️  Issues: {}", done.total_issues)?;
                writeln!(self.out, "   🔥 Critical: {}", done.critical_issues)?;
                writeln!(self.out, "   ⏱️  Duration: {}ms", done.duration_ms)
            }
        }
    }

    fn page_line(&mut self, page: &PageScanResult) -> io::Result<()> {
        let url = truncate(&page.url);
        match page.status {
            PageStatus::Scanning => writeln!(self.out, "⏳ {url}"),
            PageStatus::Complete => writeln!(
                self.out,
                "✅ {url} [{}] {} issue(s) in {}ms",
                page.http_status.unwrap_or(0),
                page.issue_count.unwrap_or(0),
                page.duration_ms.unwrap_or(0)
            ),
            PageStatus::Failed => writeln!(
                self.out,
                "❌ {url}: {}",
                page.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    fn issue_line(&mut self, issue: &Issue) -> io::Result<()> {
        let location = match (&issue.file, issue.line) {
            (Some(file), Some(line)) => format!(" ({file}:{line})"),
            (Some(file), None) => format!(" ({file})"),
            _ => String::new(),
        };
        writeln!(
            self.out,
            "   {} {:<8} {}{}",
            severity_icon(issue.severity),
            issue.severity.to_string().to_uppercase(),
            issue.message,
            location
        )?;

        if let Some(fix) = &issue.fix_suggestion {
            let auto = if issue.auto_fixable { ", auto-fixable" } else { "" };
            writeln!(
                self.out,
                "      💡 {} ({:.0}% confidence{auto})",
                fix.description,
                fix.confidence * 100.0
            )?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔥",
        Severity::High => "🔴",
        Severity::Medium => "🟠",
        Severity::Low => "🟡",
        Severity::Info => "🔵",
    }
}

fn truncate(url: &str) -> String {
    if url.chars().count() > URL_WIDTH {
        let head: String = url.chars().take(URL_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        url.to_string()
    }
}
