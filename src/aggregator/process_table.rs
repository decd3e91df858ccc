//! Process identities and the per-process tables built straight from the
//! process enumeration.
//!
//! A pid alone does not identify a process: pids are reused during a trace.
//! [`Process`] pairs the pid with the image name, and [`ProcessTable`] maps the
//! model's process records and raw pids onto those identities.

use crate::parser::trace_model::{ProcessIndex, ProcessRecord, TraceSources};
use crate::utils::config::UNKNOWN_PROCESS_ID;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::collections::HashMap;

/// Identity of a process within a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Process {
    pub pid: u32,
    pub image_name: String,
}

impl Process {
    pub fn new(pid: u32, image_name: impl Into<String>) -> Self {
        Self {
            pid,
            image_name: image_name.into(),
        }
    }

    /// Bucket for events that cannot be attributed to any enumerated process
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_PROCESS_ID, "")
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

/// Start, end and exit code of a process, each absent when not observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessLifetimeInfo {
    /// Epoch milliseconds, None if the process predates the trace
    pub start_time_ms: Option<i64>,

    /// Epoch milliseconds, None if the process outlived the trace
    pub end_time_ms: Option<i64>,

    pub exit_code: Option<i32>,
}

impl ProcessLifetimeInfo {
    /// Combine with an earlier observation of the same process, keeping
    /// the earlier value of every field this one lacks
    pub fn merged_over(&self, earlier: &ProcessLifetimeInfo) -> ProcessLifetimeInfo {
        ProcessLifetimeInfo {
            start_time_ms: self.start_time_ms.or(earlier.start_time_ms),
            end_time_ms: self.end_time_ms.or(earlier.end_time_ms),
            exit_code: self.exit_code.or(earlier.exit_code),
        }
    }
}

impl From<&ProcessRecord> for ProcessLifetimeInfo {
    fn from(record: &ProcessRecord) -> Self {
        Self {
            start_time_ms: record.create_time_ms,
            end_time_ms: record.exit_time_ms,
            exit_code: record.exit_code,
        }
    }
}

/// Primary process table of a trace
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    /// Distinct processes in enumeration order
    processes: IndexSet<Process>,

    /// Identity of each model record, by [`ProcessIndex`]
    by_index: Vec<Process>,

    /// Latest process enumerated for each pid
    by_pid: HashMap<u32, Process>,
}

impl ProcessTable {
    /// Build the table from the model's process enumeration
    ///
    /// **Public** - called once, after all data sources are drained
    ///
    /// # Arguments
    /// * `records` - Process records in enumeration order
    pub fn from_records(records: &[ProcessRecord]) -> Self {
        let mut table = Self::default();

        for record in records {
            let process = Process::new(record.pid, record.image_name.clone());
            if !table.processes.insert(process.clone()) {
                debug!("Process {} ({}) enumerated more than once", process.pid, process.image_name);
            }
            table.by_pid.insert(process.pid, process.clone());
            table.by_index.push(process);
        }

        table
    }

    /// Identity of the model record at `index`
    pub fn resolve(&self, index: ProcessIndex) -> &Process {
        &self.by_index[index.0]
    }

    /// Identity of an optional model record
    pub fn resolve_opt(&self, index: Option<ProcessIndex>) -> Option<&Process> {
        index.map(|index| self.resolve(index))
    }

    /// Lookup from raw pid to process, used by the reconcile pass
    pub fn pid_lookup(&self) -> &HashMap<u32, Process> {
        &self.by_pid
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.iter()
    }
}

/// Lifetime info of every enumerated process
///
/// When two records share an identity their lifetimes are merged field by
/// field, the later record winning wherever it knows a value.
pub fn gather_lifetimes(
    records: &[ProcessRecord],
    table: &ProcessTable,
) -> IndexMap<Process, ProcessLifetimeInfo> {
    let mut lifetimes: IndexMap<Process, ProcessLifetimeInfo> = IndexMap::new();

    for (index, record) in records.iter().enumerate() {
        let later = ProcessLifetimeInfo::from(record);
        lifetimes
            .entry(table.resolve(ProcessIndex(index)).clone())
            .and_modify(|earlier| *earlier = later.merged_over(earlier))
            .or_insert(later);
    }

    lifetimes
}

/// Loaded image names of every process that loaded any
pub fn gather_images(
    records: &[ProcessRecord],
    table: &ProcessTable,
) -> IndexMap<Process, Vec<String>> {
    let mut images: IndexMap<Process, Vec<String>> = IndexMap::new();

    for (index, record) in records.iter().enumerate() {
        if record.images.is_empty() {
            continue;
        }
        images
            .entry(table.resolve(ProcessIndex(index)).clone())
            .or_default()
            .extend(record.images.iter().cloned());
    }

    images
}

/// Thread ids of every process that owned any, in enumeration order
pub fn gather_threads(sources: &TraceSources, table: &ProcessTable) -> IndexMap<Process, Vec<u32>> {
    let mut threads: IndexMap<Process, Vec<u32>> = IndexMap::new();

    for thread in &sources.threads {
        threads
            .entry(table.resolve(thread.process).clone())
            .or_default()
            .push(thread.tid);
    }

    threads
}
