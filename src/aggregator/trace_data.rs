//! All per-process aggregates of one trace.

use super::collector::TraceCollector;
use super::event_statistics::{EventCounts, EventStatistics};
use super::process_table::{
    gather_images, gather_lifetimes, gather_threads, Process, ProcessLifetimeInfo, ProcessTable,
};
use super::scheduling::{count_context_switches, count_cpu_samples, count_ready_threads, ProcessCounts};
use super::stacks::count_stacks;
use crate::parser::read_etl_file;
use crate::parser::trace_model::TraceSources;
use crate::utils::config::ETL_EXTENSION;
use crate::utils::error::TraceError;
use indexmap::IndexMap;
use log::info;
use std::path::{Path, PathBuf};

/// Everything gathered from an ETL file, keyed by process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceData {
    pub etl_path: PathBuf,
    pub processes: Vec<Process>,
    pub lifetimes: IndexMap<Process, ProcessLifetimeInfo>,
    pub images: IndexMap<Process, Vec<String>>,
    pub threads: IndexMap<Process, Vec<u32>>,
    pub sampled_profile_counts: ProcessCounts,
    pub context_switch_counts: ProcessCounts,
    pub ready_thread_counts: ProcessCounts,
    pub stack_counts: IndexMap<Process, EventCounts>,
    pub event_counts: IndexMap<Process, EventCounts>,
}

impl TraceData {
    /// Decode `etl_path` and aggregate it
    ///
    /// **Public** - main entry point for data gathering
    ///
    /// # Errors
    /// * `TraceError::NotAnEtlFile` - the path does not have an `.etl` extension
    /// * Any error of the ETL decoder
    pub fn gather(etl_path: &Path) -> Result<Self, TraceError> {
        if !has_etl_extension(etl_path) {
            return Err(TraceError::NotAnEtlFile(etl_path.to_path_buf()));
        }

        info!("Reading trace {}", etl_path.display());
        let mut collector = TraceCollector::new();
        read_etl_file(etl_path, &mut collector)?;

        let (sources, statistics) = collector.finish();
        Ok(Self::from_sources(etl_path, &sources, &statistics))
    }

    /// Aggregate finished data sources
    ///
    /// Every source is scanned once. Raw pid counters are reconciled last,
    /// against the final process table.
    pub fn from_sources(etl_path: &Path, sources: &TraceSources, statistics: &EventStatistics) -> Self {
        let table = ProcessTable::from_records(&sources.processes);

        let data = Self {
            etl_path: etl_path.to_path_buf(),
            processes: table.iter().cloned().collect(),
            lifetimes: gather_lifetimes(&sources.processes, &table),
            images: gather_images(&sources.processes, &table),
            threads: gather_threads(sources, &table),
            sampled_profile_counts: count_cpu_samples(&sources.cpu_samples, &table),
            context_switch_counts: count_context_switches(&sources.context_switches, &table),
            ready_thread_counts: count_ready_threads(&sources.ready_threads, &table),
            stack_counts: count_stacks(sources, &table),
            event_counts: statistics.reconcile(table.pid_lookup()),
        };

        info!(
            "Gathered {} processes and {} events",
            data.processes.len(),
            statistics.total()
        );
        data
    }
}

/// Whether `path` ends in `.etl`, compared case-insensitively
pub(crate) fn has_etl_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ETL_EXTENSION))
}
