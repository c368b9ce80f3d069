// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
// Every scan flag maps onto one ScanOptions field. Flags left off the command
// line stay None so a --config file (or the built-in default) decides them.
// Boolean settings that default to on are switched off with --no-* flags.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use site_sentry::config::{ScanOptions, Viewport, WaitStrategy};
use site_sentry::model::{ResourceType, Severity};

#[derive(Parser, Debug)]
#[command(
    name = "site-sentry",
    version,
    about = "Crawl a website and report runtime errors with suggested fixes",
    long_about = "site-sentry visits every same-origin page of a website, records console output, \
                  failed requests and load timings, and reports each problem as an issue with a \
                  suggested fix. Events are written as JSON Lines for CI pipelines and tools."
)]
pub struct Cli {
    /// Log debug details to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a website
    ///
    /// Example: site-sentry scan https://example.com --max-pages 20 --critical-only
    Scan(ScanArgs),

    /// List the fix-suggestion rules in the order they are tried
    Rules,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Base URL to start crawling from
    pub url: String,

    /// JSON file with scan options; flags given here override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the JSON Lines event stream to FILE instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Don't print human-readable progress to stderr
    #[arg(long, short)]
    pub quiet: bool,

    /// Maximum number of pages to visit [default: 100]
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum link depth (accepted but not enforced) [default: 3]
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Pages scanned at the same time [default: 1]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Viewport to screenshot; repeat for several (mobile, tablet, desktop)
    #[arg(long = "viewport", value_name = "VIEWPORT")]
    pub viewports: Vec<Viewport>,

    /// When navigation counts as done (load, domcontentloaded, networkidle, commit)
    #[arg(long = "wait", value_name = "STRATEGY")]
    pub wait_strategy: Option<WaitStrategy>,

    /// Emit events only when the scan is over, without progress events
    #[arg(long)]
    pub no_progressive: bool,

    /// Don't move critical issues ahead of their page's completion event
    #[arg(long)]
    pub no_prioritize_critical: bool,

    /// Only crawl URLs matching this glob; repeatable
    #[arg(long = "include", value_name = "GLOB")]
    pub include_patterns: Vec<String>,

    /// Never crawl URLs matching this glob; repeatable, wins over --include
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude_patterns: Vec<String>,

    /// Abort sub-requests to other origins
    #[arg(long)]
    pub block_external: bool,

    /// Domain still allowed with --block-external; repeatable
    #[arg(long = "allow-domain", value_name = "DOMAIN")]
    pub allowed_domains: Vec<String>,

    /// Resource type to abort (image, font, media, ...); repeatable
    #[arg(long = "block-resource", value_name = "TYPE")]
    pub blocked_resource_types: Vec<ResourceType>,

    #[arg(long)]
    pub no_screenshots: bool,

    #[arg(long)]
    pub no_console: bool,

    #[arg(long)]
    pub no_network: bool,

    #[arg(long)]
    pub no_performance: bool,

    /// Skip the recurring-issue report at the end of the scan
    #[arg(long)]
    pub no_patterns: bool,

    /// Directory for screenshots [default: screenshots]
    #[arg(long, value_name = "DIR")]
    pub screenshot_dir: Option<PathBuf>,

    /// Only report critical issues
    #[arg(long)]
    pub critical_only: bool,

    /// Only report issues at or above this severity
    #[arg(long, value_name = "SEVERITY")]
    pub min_severity: Option<Severity>,
}

impl ScanArgs {
    // The options layer these flags describe; unset flags stay None
    pub fn to_options(&self) -> ScanOptions {
        ScanOptions {
            base_url: Some(self.url.clone()),
            max_pages: self.max_pages,
            max_depth: self.max_depth,
            concurrency: self.concurrency,
            viewports: non_empty(&self.viewports),
            wait_strategy: self.wait_strategy,
            progressive: off_if(self.no_progressive),
            prioritize_critical: off_if(self.no_prioritize_critical),
            include_patterns: non_empty(&self.include_patterns),
            exclude_patterns: non_empty(&self.exclude_patterns),
            block_external: on_if(self.block_external),
            allowed_domains: non_empty(&self.allowed_domains),
            blocked_resource_types: non_empty(&self.blocked_resource_types),
            screenshots: off_if(self.no_screenshots),
            console: off_if(self.no_console),
            network: off_if(self.no_network),
            performance: off_if(self.no_performance),
            pattern_analysis: off_if(self.no_patterns),
            screenshot_dir: self.screenshot_dir.clone(),
            critical_only: on_if(self.critical_only),
            min_severity: self.min_severity,
        }
    }
}

fn non_empty<T: Clone>(values: &[T]) -> Option<Vec<T>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn on_if(flag: bool) -> Option<bool> {
    flag.then_some(true)
}

fn off_if(flag: bool) -> Option<bool> {
    flag.then_some(false)
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Option<bool> and not bool in ScanOptions?
//    - A plain `false` can't tell "not given" from "turned off"
//    - With Option, a flag that wasn't passed leaves the config file's value
//      in place
//
// 2. How do --viewport and --wait parse?
//    - Viewport, WaitStrategy, Severity and ResourceType implement FromStr
//    - clap picks that up, so the CLI and the config file accept the same
//      spellings
// -----------------------------------------------------------------------------
