//! Serialized shape of a trace info document.
//!
//! Field names follow the fixture format consumed by downstream test
//! suites (camelCase). Optional lifetime fields serialize as `null`.

use crate::aggregator::{EventCounts, Process, ProcessLifetimeInfo, TraceData};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root of the output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceInfoDocument {
    /// Path of the trace the data was gathered from
    pub etl_path: String,

    pub data: TraceInfoData,
}

/// Per-process tables, in output order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceInfoData {
    pub process_list: Vec<ProcessEntry>,
    pub process_lifetime_info_list: Vec<ProcessLifetimeEntry>,
    pub image_lists: Vec<ImageListEntry>,
    pub thread_lists: Vec<ThreadListEntry>,
    pub sampled_profile_counts: Vec<ProcessCountEntry>,
    pub context_switch_counts: Vec<ProcessCountEntry>,
    pub ready_thread_counts: Vec<ProcessCountEntry>,
    pub stack_counts: Vec<StackCountEntry>,
    pub general_event_counts: Vec<GeneralEventCountEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub image_name: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessLifetimeEntry {
    pub process: ProcessEntry,
    pub lifetime_info: LifetimeInfoEntry,
}

/// Times are epoch milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeInfoEntry {
    pub start_time_ms_stamp: Option<i64>,
    pub end_time_ms_stamp: Option<i64>,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageListEntry {
    pub process: ProcessEntry,
    pub image_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadListEntry {
    pub process: ProcessEntry,
    pub thread_list: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCountEntry {
    pub process: ProcessEntry,
    pub count: u64,
}

/// Count of one event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCountEntry {
    /// Serialized as a lowercase hyphenated GUID
    pub provider_id: Uuid,
    pub event_id: u16,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackCountEntry {
    pub process: ProcessEntry,
    pub stack_counts_by_provider_and_id: Vec<EventCountEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralEventCountEntry {
    pub process: ProcessEntry,
    pub general_event_counts_by_provider_and_id: Vec<EventCountEntry>,
}

impl From<&Process> for ProcessEntry {
    fn from(process: &Process) -> Self {
        Self {
            image_name: process.image_name.clone(),
            pid: process.pid,
        }
    }
}

impl From<&ProcessLifetimeInfo> for LifetimeInfoEntry {
    fn from(info: &ProcessLifetimeInfo) -> Self {
        Self {
            start_time_ms_stamp: info.start_time_ms,
            end_time_ms_stamp: info.end_time_ms,
            exit_code: info.exit_code,
        }
    }
}

impl From<&TraceData> for TraceInfoDocument {
    fn from(data: &TraceData) -> Self {
        Self {
            etl_path: data.etl_path.display().to_string(),
            data: TraceInfoData {
                process_list: data.processes.iter().map(ProcessEntry::from).collect(),
                process_lifetime_info_list: data
                    .lifetimes
                    .iter()
                    .map(|(process, info)| ProcessLifetimeEntry {
                        process: process.into(),
                        lifetime_info: info.into(),
                    })
                    .collect(),
                image_lists: data
                    .images
                    .iter()
                    .map(|(process, images)| ImageListEntry {
                        process: process.into(),
                        image_list: images.clone(),
                    })
                    .collect(),
                thread_lists: data
                    .threads
                    .iter()
                    .map(|(process, threads)| ThreadListEntry {
                        process: process.into(),
                        thread_list: threads.clone(),
                    })
                    .collect(),
                sampled_profile_counts: count_entries(&data.sampled_profile_counts),
                context_switch_counts: count_entries(&data.context_switch_counts),
                ready_thread_counts: count_entries(&data.ready_thread_counts),
                stack_counts: data
                    .stack_counts
                    .iter()
                    .map(|(process, counts)| StackCountEntry {
                        process: process.into(),
                        stack_counts_by_provider_and_id: event_count_entries(counts),
                    })
                    .collect(),
                general_event_counts: data
                    .event_counts
                    .iter()
                    .map(|(process, counts)| GeneralEventCountEntry {
                        process: process.into(),
                        general_event_counts_by_provider_and_id: event_count_entries(counts),
                    })
                    .collect(),
            },
        }
    }
}

fn count_entries(counts: &IndexMap<Process, u64>) -> Vec<ProcessCountEntry> {
    counts
        .iter()
        .map(|(process, count)| ProcessCountEntry {
            process: process.into(),
            count: *count,
        })
        .collect()
}

fn event_count_entries(counts: &EventCounts) -> Vec<EventCountEntry> {
    counts
        .iter()
        .map(|(key, count)| EventCountEntry {
            provider_id: key.provider_id,
            event_id: key.id,
            count: *count,
        })
        .collect()
}
