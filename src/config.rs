// src/config.rs
// =============================================================================
// Scan configuration.
//
// Configuration comes from up to three places, merged in this order (later
// wins):
//   1. built-in defaults
//   2. a JSON config file (--config scan.json)
//   3. explicit command-line flags
//
// Every source produces a ScanOptions where each field is optional. Once the
// layers are merged, ScanConfig::resolve() fills the gaps with defaults and
// produces the immutable ScanConfig the crawler runs with.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

use crate::crawl::UrlFilter;
use crate::error::ConfigError;
use crate::model::{ResourceType, Severity};

pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

// Screen presets used for screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    Mobile,
    Tablet,
    Desktop,
}

impl Viewport {
    // (width, height) in CSS pixels
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Viewport::Mobile => (375, 667),
            Viewport::Tablet => (768, 1024),
            Viewport::Desktop => (1920, 1080),
        }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Viewport::Mobile => "mobile",
            Viewport::Tablet => "tablet",
            Viewport::Desktop => "desktop",
        };
        f.write_str(name)
    }
}

impl FromStr for Viewport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mobile" => Ok(Viewport::Mobile),
            "tablet" => Ok(Viewport::Tablet),
            "desktop" => Ok(Viewport::Desktop),
            other => Err(ConfigError::UnknownValue {
                kind: "viewport",
                value: other.to_string(),
            }),
        }
    }
}

// When navigation is considered finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
    Commit,
}

impl fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitStrategy::Load => "load",
            WaitStrategy::DomContentLoaded => "domcontentloaded",
            WaitStrategy::NetworkIdle => "networkidle",
            WaitStrategy::Commit => "commit",
        };
        f.write_str(name)
    }
}

impl FromStr for WaitStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(WaitStrategy::Load),
            "domcontentloaded" => Ok(WaitStrategy::DomContentLoaded),
            "networkidle" => Ok(WaitStrategy::NetworkIdle),
            "commit" => Ok(WaitStrategy::Commit),
            other => Err(ConfigError::UnknownValue {
                kind: "wait strategy",
                value: other.to_string(),
            }),
        }
    }
}

// Which sub-requests a page is allowed to make
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBlocking {
    /// Abort requests to other origins (unless whitelisted)
    pub block_external: bool,
    /// Domain substrings that are allowed even when external requests are blocked
    pub allowed_domains: Vec<String>,
    /// Resource types that are always aborted
    pub blocked_types: Vec<ResourceType>,
}

impl ResourceBlocking {
    pub fn is_enabled(&self) -> bool {
        self.block_external || !self.blocked_types.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub screenshots: bool,
    pub console: bool,
    pub network: bool,
    pub performance: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            screenshots: true,
            console: true,
            network: true,
            performance: true,
        }
    }
}

// Post-hoc filters. The crawler never applies these itself; they are carried
// here so the output layer can read them from the same resolved config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFilters {
    pub critical_only: bool,
    pub min_severity: Option<Severity>,
}

// One layer of configuration. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanOptions {
    pub base_url: Option<String>,
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
    pub concurrency: Option<usize>,
    pub viewports: Option<Vec<Viewport>>,
    pub wait_strategy: Option<WaitStrategy>,
    pub progressive: Option<bool>,
    pub prioritize_critical: Option<bool>,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
    pub block_external: Option<bool>,
    pub allowed_domains: Option<Vec<String>>,
    pub blocked_resource_types: Option<Vec<ResourceType>>,
    pub screenshots: Option<bool>,
    pub console: Option<bool>,
    pub network: Option<bool>,
    pub performance: Option<bool>,
    pub pattern_analysis: Option<bool>,
    pub screenshot_dir: Option<PathBuf>,
    pub critical_only: Option<bool>,
    pub min_severity: Option<Severity>,
}

impl ScanOptions {
    // Reads one layer from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    // Puts `top` over `self`: any value set in `top` wins
    pub fn overlay(self, top: ScanOptions) -> ScanOptions {
        ScanOptions {
            base_url: top.base_url.or(self.base_url),
            max_pages: top.max_pages.or(self.max_pages),
            max_depth: top.max_depth.or(self.max_depth),
            concurrency: top.concurrency.or(self.concurrency),
            viewports: top.viewports.or(self.viewports),
            wait_strategy: top.wait_strategy.or(self.wait_strategy),
            progressive: top.progressive.or(self.progressive),
            prioritize_critical: top.prioritize_critical.or(self.prioritize_critical),
            include_patterns: top.include_patterns.or(self.include_patterns),
            exclude_patterns: top.exclude_patterns.or(self.exclude_patterns),
            block_external: top.block_external.or(self.block_external),
            allowed_domains: top.allowed_domains.or(self.allowed_domains),
            blocked_resource_types: top.blocked_resource_types.or(self.blocked_resource_types),
            screenshots: top.screenshots.or(self.screenshots),
            console: top.console.or(self.console),
            network: top.network.or(self.network),
            performance: top.performance.or(self.performance),
            pattern_analysis: top.pattern_analysis.or(self.pattern_analysis),
            screenshot_dir: top.screenshot_dir.or(self.screenshot_dir),
            critical_only: top.critical_only.or(self.critical_only),
            min_severity: top.min_severity.or(self.min_severity),
        }
    }
}

// The resolved, immutable configuration for one run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub base_url: Url,
    pub max_pages: usize,
    /// Accepted and reported, but the crawl does not limit depth
    pub max_depth: usize,
    /// Number of page sessions allowed in flight at once (1 = sequential)
    pub concurrency: usize,
    pub viewports: Vec<Viewport>,
    pub wait_strategy: WaitStrategy,
    pub progressive: bool,
    pub prioritize_critical: bool,
    pub url_filter: UrlFilter,
    pub blocking: ResourceBlocking,
    pub capture: CaptureOptions,
    pub pattern_analysis: bool,
    pub screenshot_dir: PathBuf,
    pub issue_filters: IssueFilters,
}

impl ScanConfig {
    // Shortcut for a config with every default and just a base URL
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Self::resolve(ScanOptions {
            base_url: Some(base_url.to_string()),
            ..ScanOptions::default()
        })
    }

    pub fn resolve(options: ScanOptions) -> Result<Self, ConfigError> {
        let raw_url = options.base_url.ok_or(ConfigError::MissingBaseUrl)?;
        let mut base_url = Url::parse(&raw_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: raw_url.clone(),
            source,
        })?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(raw_url));
        }
        // The seed goes through the same normalization as discovered links
        base_url.set_fragment(None);

        let url_filter = UrlFilter::new(
            &options.include_patterns.unwrap_or_default(),
            &options.exclude_patterns.unwrap_or_default(),
        )?;

        let defaults = CaptureOptions::default();
        let viewports = match options.viewports {
            Some(list) if !list.is_empty() => list,
            _ => vec![Viewport::Desktop],
        };

        Ok(Self {
            base_url,
            max_pages: options.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            max_depth: options.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            concurrency: options.concurrency.unwrap_or(1).max(1),
            viewports,
            wait_strategy: options.wait_strategy.unwrap_or_default(),
            progressive: options.progressive.unwrap_or(true),
            prioritize_critical: options.prioritize_critical.unwrap_or(true),
            url_filter,
            blocking: ResourceBlocking {
                block_external: options.block_external.unwrap_or(false),
                allowed_domains: options.allowed_domains.unwrap_or_default(),
                blocked_types: options.blocked_resource_types.unwrap_or_default(),
            },
            capture: CaptureOptions {
                screenshots: options.screenshots.unwrap_or(defaults.screenshots),
                console: options.console.unwrap_or(defaults.console),
                network: options.network.unwrap_or(defaults.network),
                performance: options.performance.unwrap_or(defaults.performance),
            },
            pattern_analysis: options.pattern_analysis.unwrap_or(true),
            screenshot_dir: options
                .screenshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCREENSHOT_DIR)),
            issue_filters: IssueFilters {
                critical_only: options.critical_only.unwrap_or(false),
                min_severity: options.min_severity,
            },
        })
    }
}
