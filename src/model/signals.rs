// src/model/signals.rs
// =============================================================================
// Raw per-page observations.
//
// A SignalBundle is created fresh for every page visit, handed to the issue
// checker, and dropped once the page's events have been emitted. Nothing in
// here is kept across pages.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::Viewport;
use crate::error::ConfigError;

// Kind of a sub-request, as reported by the page engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    Websocket,
    Other,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Document => "document",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Image => "image",
            ResourceType::Media => "media",
            ResourceType::Font => "font",
            ResourceType::Script => "script",
            ResourceType::Xhr => "xhr",
            ResourceType::Fetch => "fetch",
            ResourceType::Websocket => "websocket",
            ResourceType::Other => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(ResourceType::Document),
            "stylesheet" => Ok(ResourceType::Stylesheet),
            "image" => Ok(ResourceType::Image),
            "media" => Ok(ResourceType::Media),
            "font" => Ok(ResourceType::Font),
            "script" => Ok(ResourceType::Script),
            "xhr" => Ok(ResourceType::Xhr),
            "fetch" => Ok(ResourceType::Fetch),
            "websocket" => Ok(ResourceType::Websocket),
            "other" => Ok(ResourceType::Other),
            other => Err(ConfigError::UnknownValue {
                kind: "resource type",
                value: other.to_string(),
            }),
        }
    }
}

// One console message observed during the page's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Console message type: "log", "warning", "error", ...
    pub kind: String,
    pub text: String,
    /// Declared source location, usually "url:line:column"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConsoleEntry {
    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}

// One completed response observed on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub resource_type: ResourceType,
    /// Response time minus request time, 0 when timing isn't tracked
    pub duration_ms: u64,
    pub failed: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// loadEventEnd - fetchStart
    pub load_time_ms: u64,
    /// responseStart - requestStart
    pub time_to_first_byte_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub largest_contentful_paint_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub viewport: Viewport,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub url: String,
    /// HTTP status of the top-level navigation, 0 if no response was obtained
    pub status: u16,
    pub console: Vec<ConsoleEntry>,
    pub network: Vec<NetworkRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<Screenshot>,
    pub captured_at: DateTime<Utc>,
}

impl SignalBundle {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            console: Vec::new(),
            network: Vec::new(),
            performance: None,
            screenshots: Vec::new(),
            captured_at: Utc::now(),
        }
    }
}
