// src/checker/performance.rs
// =============================================================================
// Performance thresholds.
//
// Two independent checks; both can fire for the same page:
// - load time over 5s        (High above 10s, otherwise Medium)
// - LCP over 2.5s, if known  (High above 4s, otherwise Medium)
// =============================================================================

use crate::model::{PerformanceMetrics, Severity};

pub const SLOW_LOAD_MS: u64 = 5_000;
pub const VERY_SLOW_LOAD_MS: u64 = 10_000;
pub const POOR_LCP_MS: u64 = 2_500;
pub const VERY_POOR_LCP_MS: u64 = 4_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceFinding {
    pub severity: Severity,
    pub message: String,
}

pub fn performance_findings(metrics: &PerformanceMetrics) -> Vec<PerformanceFinding> {
    let mut findings = Vec::new();

    if metrics.load_time_ms > SLOW_LOAD_MS {
        let severity = if metrics.load_time_ms > VERY_SLOW_LOAD_MS {
            Severity::High
        } else {
            Severity::Medium
        };
        findings.push(PerformanceFinding {
            severity,
            message: format!(
                "Slow page load: {}ms (threshold {}ms)",
                metrics.load_time_ms, SLOW_LOAD_MS
            ),
        });
    }

    if let Some(lcp) = metrics.largest_contentful_paint_ms {
        if lcp > POOR_LCP_MS {
            let severity = if lcp > VERY_POOR_LCP_MS {
                Severity::High
            } else {
                Severity::Medium
            };
            findings.push(PerformanceFinding {
                severity,
                message: format!(
                    "Poor Largest Contentful Paint: {}ms (threshold {}ms)",
                    lcp, POOR_LCP_MS
                ),
            });
        }
    }

    findings
}
