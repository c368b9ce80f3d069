// src/main.rs
// =============================================================================
// This is the entry point of the site-sentry CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (to stderr, so stdout stays a clean event stream)
// 3. Dispatch to the subcommand handler
// 4. Exit with a proper code (0 = clean, 1 = critical issues, 2 = error)
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, ScanArgs};
use site_sentry::checker::FIX_RULES;
use site_sentry::config::{ScanConfig, ScanOptions};
use site_sentry::engine::HttpEngineLauncher;
use site_sentry::output::{EventFilter, Reporter, TerminalReporter};
use site_sentry::Orchestrator;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins when set; otherwise only our own crate logs at info
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,site_sentry=debug"
    } else {
        "warn,site_sentry=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

// Returns:
//   Ok(0) = scan finished, no critical issues
//   Ok(1) = scan finished, critical issues found
//   Err   = configuration, engine or output failure (exit code 2)
async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Scan(args) => handle_scan(args).await,
        Commands::Rules => {
            print_rules();
            Ok(0)
        }
    }
}

async fn handle_scan(args: ScanArgs) -> Result<i32> {
    let options = load_options(&args)?;
    let screenshots_requested = options.screenshots == Some(true);
    let mut config = ScanConfig::resolve(options).context("invalid scan configuration")?;

    // The bundled engine speaks plain HTTP and has no renderer to capture
    if config.capture.screenshots {
        if screenshots_requested {
            tracing::warn!("screenshots are not supported by the HTTP engine; skipping them");
        }
        config.capture.screenshots = false;
    }

    let mut reporter = Reporter::new(EventFilter::from(config.issue_filters))
        .with_jsonl(open_output(&args)?);
    if !args.quiet {
        reporter = reporter.with_terminal(TerminalReporter::stderr());
    }

    let orchestrator = Orchestrator::new(config, HttpEngineLauncher::default());
    let summary = orchestrator
        .run(&mut reporter)
        .await
        .context("scan could not start")?;

    if let Some(e) = reporter.take_failure() {
        return Err(e).context("failed to write event stream");
    }

    if summary.critical_issues > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// defaults < --config file < command-line flags
fn load_options(args: &ScanArgs) -> Result<ScanOptions> {
    let file_layer = match &args.config {
        Some(path) => ScanOptions::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ScanOptions::default(),
    };
    Ok(file_layer.overlay(args.to_options()))
}

fn open_output(args: &ScanArgs) -> Result<Box<dyn Write + Send>> {
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

fn print_rules() {
    println!("{:<4} {:<24}", "#", "RULE");
    println!("{}", "=".repeat(28));
    for (position, rule) in FIX_RULES.iter().enumerate() {
        println!("{:<4} {:<24}", position + 1, rule.name);
    }
    println!();
    println!("Rules are tried top to bottom; the first match supplies the fix.");
}
