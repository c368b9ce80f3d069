// src/crawl/sink.rs
// =============================================================================
// Where events go.
//
// The orchestrator hands every event to an EventSink, one at a time, in the
// order they must be seen. A sink that returns SinkClosed tells the
// orchestrator nobody is listening any more, which cancels the run.
// =============================================================================

use tokio::sync::mpsc::UnboundedSender;

use crate::error::SinkClosed;
use crate::model::ScanEvent;

pub trait EventSink {
    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed>;
}

// Collects everything; handy for tests and batch callers
impl EventSink for Vec<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        self.push(event);
        Ok(())
    }
}

impl EventSink for UnboundedSender<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        (**self).emit(event)
    }
}

// Adapts a closure into a sink that never closes
pub struct FnSink<F>(pub F);

impl<F: FnMut(ScanEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: ScanEvent) -> Result<(), SinkClosed> {
        (self.0)(event);
        Ok(())
    }
}
