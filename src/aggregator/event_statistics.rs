//! General event counts, reconciled from raw pids to processes.
//!
//! While the trace is decoded only the raw header pid of each event is known,
//! and some events carry none at all. Counts are therefore collected per raw
//! pid first and swapped to [`Process`] keys in a single pass once the process
//! table is final.

use super::process_table::Process;
use crate::parser::events::EventKey;
use crate::utils::config::UNKNOWN_PROCESS_ID;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;

/// Event counts by provider and id
pub type EventCounts = IndexMap<EventKey, u64>;

/// Per raw pid event counters
#[derive(Debug, Clone, Default)]
pub struct EventStatistics {
    raw_counts: IndexMap<u32, EventCounts>,
}

impl EventStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event
    ///
    /// **Public** - called for every decoded event
    ///
    /// # Arguments
    /// * `pid` - Header process id, None when the event has none (counted as pid 0)
    /// * `key` - Provider and id of the event
    pub fn record_raw_event(&mut self, pid: Option<u32>, key: EventKey) {
        let pid = pid.unwrap_or(UNKNOWN_PROCESS_ID);
        *self
            .raw_counts
            .entry(pid)
            .or_default()
            .entry(key)
            .or_insert(0) += 1;
    }

    /// Counters collected so far, keyed by raw pid
    pub fn raw_counts(&self) -> &IndexMap<u32, EventCounts> {
        &self.raw_counts
    }

    /// Total number of events recorded
    pub fn total(&self) -> u64 {
        self.raw_counts.values().flat_map(|counts| counts.values()).sum()
    }

    /// Swap raw pids for processes, see [`reconcile`]
    pub fn reconcile(&self, process_table: &HashMap<u32, Process>) -> IndexMap<Process, EventCounts> {
        reconcile(process_table, &self.raw_counts)
    }
}

/// Re-key raw pid counters by process
///
/// **Public** - the single reconciliation pass
///
/// # Arguments
/// * `process_table` - Final pid to process lookup
/// * `raw_counts` - Counters keyed by raw pid
///
/// # Returns
/// Counters keyed by process. Pids missing from `process_table` all land in
/// [`Process::unknown`]. Buckets that end up on the same process are summed
/// key by key.
pub fn reconcile(
    process_table: &HashMap<u32, Process>,
    raw_counts: &IndexMap<u32, EventCounts>,
) -> IndexMap<Process, EventCounts> {
    let mut reconciled: IndexMap<Process, EventCounts> = IndexMap::new();
    let mut unresolved_pids = 0usize;

    for (pid, counts) in raw_counts {
        let process = match process_table.get(pid) {
            Some(process) => process.clone(),
            None => {
                unresolved_pids += 1;
                Process::unknown()
            }
        };
        merge_counts(reconciled.entry(process).or_default(), counts);
    }

    if unresolved_pids > 0 {
        debug!("{} raw pids could not be resolved to a process", unresolved_pids);
    }

    reconciled
}

/// Add every count of `source` into `target`
pub fn merge_counts(target: &mut EventCounts, source: &EventCounts) {
    for (key, count) in source {
        *target.entry(*key).or_insert(0) += count;
    }
}
