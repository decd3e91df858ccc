//! Event sink feeding both the trace model and the general event counters.

use super::event_statistics::EventStatistics;
use crate::parser::events::{DecodedEvent, TraceEventSink};
use crate::parser::trace_model::{TraceModel, TraceSources};

/// Collects everything a single pass over the trace produces
#[derive(Debug, Default)]
pub struct TraceCollector {
    model: TraceModel,
    statistics: EventStatistics,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish the model and hand back both halves
    pub fn finish(self) -> (TraceSources, EventStatistics) {
        (self.model.finish(), self.statistics)
    }
}

impl TraceEventSink for TraceCollector {
    fn handle_event(&mut self, event: DecodedEvent) {
        self.statistics
            .record_raw_event(event.raw.process_id, event.raw.event_key());
        self.model.handle_event(&event);
    }
}
