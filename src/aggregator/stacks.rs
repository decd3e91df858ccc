//! Stack counts per process, keyed by the event each stack was captured for.

use super::event_statistics::EventCounts;
use super::process_table::{Process, ProcessTable};
use crate::parser::trace_model::TraceSources;
use indexmap::IndexMap;
use log::debug;

/// Count stacks by owning process and originating event
///
/// **Public** - main entry point for stack aggregation
///
/// # Arguments
/// * `sources` - Finished data sources, holding stacks and the stack-event index
/// * `table` - Process identities
///
/// # Returns
/// Counts by process, then by the origin's [`EventKey`](crate::parser::EventKey).
/// Stacks of unknown processes go to [`Process::unknown`]. Stacks whose
/// originating event is not in the trace are dropped.
pub fn count_stacks(sources: &TraceSources, table: &ProcessTable) -> IndexMap<Process, EventCounts> {
    let mut counts: IndexMap<Process, EventCounts> = IndexMap::new();
    let mut dropped = 0usize;

    for stack in &sources.stacks {
        let Some(origin) = stack.origin_event(&sources.stack_events) else {
            dropped += 1;
            continue;
        };

        let process = table
            .resolve_opt(stack.process)
            .cloned()
            .unwrap_or_else(Process::unknown);

        *counts
            .entry(process)
            .or_default()
            .entry(origin.key)
            .or_insert(0) += 1;
    }

    if dropped > 0 {
        debug!("Dropped {} stacks without an originating event", dropped);
    }

    counts
}
