// src/checker/console.rs
// =============================================================================
// Console error classification.
//
// Severity comes from keywords in the message, checked highest tier first:
//   "uncaught" | "fatal" | "critical"   -> Critical
//   "error" | "exception" | "failed"    -> High
//   anything else                       -> Medium
//
// The source location is taken from the entry's declared source when it ends
// in "path:line:column", otherwise from an "at path:line:column" frame inside
// the message text.
// =============================================================================

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{ConsoleEntry, Severity, SourceLocation};

const CRITICAL_KEYWORDS: &[&str] = &["uncaught", "fatal", "critical"];
const HIGH_KEYWORDS: &[&str] = &["error", "exception", "failed"];

// Trailing "path:line:column" on the declared source
static SOURCE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+):(\d+):(\d+)$").expect("valid regex"));

// "at path:line:column" (optionally wrapped in parentheses) inside a message
static MESSAGE_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat\s+(?:[^\s()]+\s+)?\(?([^\s()]+):(\d+):(\d+)\)?").expect("valid regex")
});

pub fn console_severity(message: &str) -> Severity {
    let lower = message.to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Severity::Critical
    } else if HIGH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Severity::High
    } else {
        Severity::Medium
    }
}

pub fn source_location(entry: &ConsoleEntry) -> SourceLocation {
    if let Some(source) = entry.source.as_deref() {
        if let Some(location) = capture_location(&SOURCE_LOCATION, source.trim()) {
            return location;
        }
    }
    capture_location(&MESSAGE_FRAME, &entry.text).unwrap_or_default()
}

fn capture_location(pattern: &Regex, text: &str) -> Option<SourceLocation> {
    let caps = pattern.captures(text)?;
    Some(SourceLocation {
        file: Some(caps.get(1)?.as_str().to_string()),
        line: caps.get(2)?.as_str().parse().ok(),
        column: caps.get(3)?.as_str().parse().ok(),
    })
}

// Everything from the first "at ..." frame line onwards, if the message has one
pub fn stack_trace(message: &str) -> Option<String> {
    let lines: Vec<&str> = message.lines().collect();
    let start = lines
        .iter()
        .position(|line| line.trim_start().starts_with("at "))?;
    Some(
        lines[start..]
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

// First line of a multi-line message, used as the issue message
pub fn headline(message: &str) -> &str {
    message.lines().next().unwrap_or(message).trim()
}
