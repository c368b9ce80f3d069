// src/checker/network.rs
// =============================================================================
// Network failure and HTTP status classification.
//
// A failed sub-request is Medium when it is a plain 404 and High for every
// other failing status. A page whose own navigation came back >= 400 gets a
// single Medium broken-link issue, whatever the exact code.
// =============================================================================

use crate::model::{NetworkRequest, Severity};

pub fn network_severity(status: u16) -> Severity {
    if status == 404 {
        Severity::Medium
    } else {
        Severity::High
    }
}

pub fn network_message(request: &NetworkRequest) -> String {
    format!(
        "Network request failed: {} {} returned {}",
        request.method, request.url, request.status
    )
}

pub fn is_broken_page(status: u16) -> bool {
    status >= 400
}

pub fn broken_page_message(url: &str, status: u16) -> String {
    format!("Page {} returned HTTP {}", url, status)
}
