// src/output/jsonl.rs
// =============================================================================
// Writes events as JSON Lines: one serialized ScanEvent per line.
//
// Each line is flushed as soon as it is written so a consumer tailing the
// stream sees pages and issues while the scan is still running.
// =============================================================================

use std::io::{self, Write};

use crate::model::ScanEvent;

pub struct JsonlWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn write(&mut self, event: &ScanEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    // Number of records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
