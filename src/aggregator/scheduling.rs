//! Per-process scheduling counts: CPU samples, context switches and
//! ready-thread events.

use super::process_table::{Process, ProcessTable};
use crate::parser::trace_model::{ContextSwitch, CpuSample, ReadyThreadEvent};
use indexmap::IndexMap;
use log::debug;

/// A count per process
pub type ProcessCounts = IndexMap<Process, u64>;

/// Count CPU samples by the process owning the sampled thread
///
/// Samples of unattributed threads are skipped.
pub fn count_cpu_samples(samples: &[CpuSample], table: &ProcessTable) -> ProcessCounts {
    let owners = samples.iter().map(|sample| table.resolve_opt(sample.process));
    count_owners(owners, "CPU samples")
}

/// Count ready-thread events by the process owning the readied thread
///
/// Events for unattributed threads are skipped.
pub fn count_ready_threads(events: &[ReadyThreadEvent], table: &ProcessTable) -> ProcessCounts {
    let owners = events.iter().map(|event| table.resolve_opt(event.readied));
    count_owners(owners, "ready-thread events")
}

/// Count context switches per process
///
/// **Public** - see [`record_context_switch`] for the counting policy
pub fn count_context_switches(switches: &[ContextSwitch], table: &ProcessTable) -> ProcessCounts {
    let mut counts = ProcessCounts::new();

    for switch in switches {
        record_context_switch(
            &mut counts,
            table.resolve_opt(switch.switch_in),
            table.resolve_opt(switch.switch_out),
        );
    }

    counts
}

/// Count one context switch
///
/// A switch between two threads of the same process counts once for that
/// process. Otherwise each known side counts once.
pub fn record_context_switch(
    counts: &mut ProcessCounts,
    switch_in: Option<&Process>,
    switch_out: Option<&Process>,
) {
    match (switch_in, switch_out) {
        (Some(switch_in), Some(switch_out)) if switch_in == switch_out => {
            increment(counts, switch_in);
        }
        _ => {
            if let Some(switch_out) = switch_out {
                increment(counts, switch_out);
            }
            if let Some(switch_in) = switch_in {
                increment(counts, switch_in);
            }
        }
    }
}

fn count_owners<'a>(
    owners: impl Iterator<Item = Option<&'a Process>>,
    what: &str,
) -> ProcessCounts {
    let mut counts = ProcessCounts::new();
    let mut skipped = 0usize;

    for owner in owners {
        match owner {
            Some(process) => increment(&mut counts, process),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} {} of unattributed threads", skipped, what);
    }

    counts
}

fn increment(counts: &mut ProcessCounts, process: &Process) {
    *counts.entry(process.clone()).or_insert(0) += 1;
}
