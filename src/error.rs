// src/error.rs
// =============================================================================
// Error types for the library.
//
// There are three classes of failure in a scan:
// - Fatal: the page engine could not be launched. The run never starts.
// - Page-scoped: navigation, timeouts, script evaluation, screenshots, and
//   panics inside engine calls. These become a failed page event and the
//   crawl moves on.
// - Link-scoped: a malformed discovered URL. It is dropped silently.
//
// EngineError covers the page-scoped class, ScanError the fatal one.
// ConfigError is raised before a run exists, while options are resolved.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch page engine: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("request to {url} was aborted by the interception policy")]
    Aborted { url: String },

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    // A page engine call panicked; the panic is confined to that page
    #[error("page session panicked: {0}")]
    Panicked(String),

    #[error("{0} is not supported by this engine")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a base URL is required")]
    MissingBaseUrl,

    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL must use http or https: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Launch(EngineError),

    // The scan task ended without reporting back
    #[error("scan task was cancelled")]
    Cancelled,
}

// Returned by an EventSink once its consumer has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event consumer closed")]
pub struct SinkClosed;
