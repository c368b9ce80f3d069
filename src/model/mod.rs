// src/model/mod.rs
// =============================================================================
// Plain data shared by every other module: issues, per-page signals and the
// events a scan emits. Nothing in here talks to the network.
// =============================================================================

mod event;
mod issue;
mod signals;

pub use event::{
    PageScanResult, PageStatus, PatternAnalysis, ScanComplete, ScanEvent, ScanProgress, ScanStart,
};
pub use issue::{
    FixOperation, FixOperationKind, FixSuggestion, Issue, IssueCategory, Severity, SourceLocation,
    AUTO_FIX_CONFIDENCE,
};
pub use signals::{
    ConsoleEntry, NetworkRequest, PerformanceMetrics, ResourceType, Screenshot, SignalBundle,
};
