// src/output/mod.rs
// =============================================================================
// The output layer sits between the orchestrator and the user.
//
// It never changes what the scan found. It only decides which issues are
// shown (EventFilter) and how events are written: as JSON Lines for
// machines, as terminal lines for people, or both.
//
// Filters apply to Issue events only. Page, progress, pattern and completion
// events always pass, and the counts in ScanComplete are the unfiltered ones.
// =============================================================================

mod jsonl;
mod terminal;

pub use jsonl::JsonlWriter;
pub use terminal::TerminalReporter;

use std::io::{self, Write};

use crate::config::IssueFilters;
use crate::crawl::EventSink;
use crate::error::SinkClosed;
use crate::model::{ScanEvent, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub critical_only: bool,
    pub min_severity: Option<Severity>,
}

impl From<IssueFilters> for EventFilter {
    fn from(filters: IssueFilters) -> Self {
        Self {
            critical_only: filters.critical_only,
            min_severity: filters.min_severity,
        }
    }
}

impl EventFilter {
    pub fn allows(&self, event: &ScanEvent) -> bool {
        let Some(issue) = event.as_issue() else {
            return true;
        };
        if self.critical_only && issue.severity != Severity::Critical {
            return false;
        }
        match self.min_severity {
            Some(min) => issue.severity >= min,
            None => true,
        }
    }
}

// The sink the CLI hands to the orchestrator
pub struct Reporter {
    filter: EventFilter,
    jsonl: Option<JsonlWriter<Box<dyn Write + Send>>>,
    terminal: Option<TerminalReporter>,
    failure: Option<io::Error>,
}

impl Reporter {
    pub fn new(filter: EventFilter) -> Self {
        Self {
            filter,
            jsonl: None,
            terminal: None,
            failure: None,
        }
    }

    pub fn with_jsonl(mut self, out: Box<dyn Write + Send>) -> Self {
        self.jsonl = Some(JsonlWriter::new(out));
        self
    }

    pub fn with_terminal(mut self, terminal: TerminalReporter) -> Self {
        self.terminal = Some(terminal);
        self
    }

    // The write error that stopped the JSONL stream, if any
    pub fn take_failure(&mut self) -> Option<io::Error> {
        self.failure.take()
    }
}

impl EventSink for Reporter {
    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        if !self.filter.allows(&event) {
            return Ok(());
        }

        if let Some(terminal) = &mut self.terminal {
            if let Err(e) = terminal.handle(&event) {
                tracing::debug!(error = %e, "terminal output failed");
            }
        }

        if let Some(jsonl) = &mut self.jsonl {
            // A broken output stream means nobody is reading: stop the scan
            if let Err(e) = jsonl.write(&event) {
                self.failure = Some(e);
                return Err(SinkClosed);
            }
        }
        Ok(())
    }
}
