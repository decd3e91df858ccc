//! Data sources rebuilt from the decoded event stream.
//!
//! The kernel only ever tells us raw pids and tids. This model tracks which
//! process and thread currently own each id, so that samples, context
//! switches, ready-thread events and stacks can be attributed to the right
//! process even when ids get reused during the trace.
//!
//! Feed events in trace order with [`TraceModel::handle_event`], then call
//! [`TraceModel::finish`] to get the immutable [`TraceSources`].

use super::clock::ClockConverter;
use super::events::{DecodedEvent, EventKey, RawEvent, SystemEvent};
use log::{debug, warn};
use std::collections::HashMap;

/// Index of a process within [`TraceSources::processes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessIndex(pub usize);

/// A process as enumerated from the trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub image_name: String,

    /// None for processes that already existed when tracing began
    pub create_time_ms: Option<i64>,

    /// None for processes still alive when tracing stopped
    pub exit_time_ms: Option<i64>,

    pub exit_code: Option<i32>,

    /// File names of loaded images, in load order
    pub images: Vec<String>,
}

impl ProcessRecord {
    pub fn new(pid: u32, image_name: impl Into<String>) -> Self {
        Self {
            pid,
            image_name: image_name.into(),
            create_time_ms: None,
            exit_time_ms: None,
            exit_code: None,
            images: Vec::new(),
        }
    }
}

/// A thread as enumerated from the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRecord {
    pub tid: u32,
    pub process: ProcessIndex,
}

/// A sampled-profile interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    pub process: Option<ProcessIndex>,
}

/// A context switch, with the owners of the threads involved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSwitch {
    pub switch_in: Option<ProcessIndex>,
    pub switch_out: Option<ProcessIndex>,
}

/// A ready-thread event, with the owner of the readied thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyThreadEvent {
    pub readied: Option<ProcessIndex>,
}

/// The event a stack was captured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEvent {
    pub key: EventKey,
}

/// Index of every event that a stack may have been captured for
#[derive(Debug, Clone, Default)]
pub struct StackEventSource {
    events: HashMap<(u32, u64), StackEvent>,
}

impl StackEventSource {
    /// Register `event` as happening on `tid` at `timestamp_raw`
    pub fn insert(&mut self, tid: u32, timestamp_raw: u64, event: StackEvent) {
        self.events.insert((tid, timestamp_raw), event);
    }

    pub fn get(&self, tid: u32, timestamp_raw: u64) -> Option<&StackEvent> {
        self.events.get(&(tid, timestamp_raw))
    }
}

/// A captured call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSnapshot {
    pub process: Option<ProcessIndex>,
    pub thread_id: u32,
    pub event_timestamp_raw: u64,
}

impl StackSnapshot {
    /// Look up the event that triggered this stack capture
    ///
    /// Returns None when the event is not part of the trace, for example
    /// because it was filtered out when the trace was written.
    pub fn origin_event<'a>(&self, events: &'a StackEventSource) -> Option<&'a StackEvent> {
        events.get(self.thread_id, self.event_timestamp_raw)
    }
}

/// Finished data sources of one trace
#[derive(Debug, Clone, Default)]
pub struct TraceSources {
    pub processes: Vec<ProcessRecord>,
    pub threads: Vec<ThreadRecord>,
    pub cpu_samples: Vec<CpuSample>,
    pub context_switches: Vec<ContextSwitch>,
    pub ready_threads: Vec<ReadyThreadEvent>,
    pub stacks: Vec<StackSnapshot>,
    pub stack_events: StackEventSource,
}

impl TraceSources {
    pub fn process(&self, index: ProcessIndex) -> &ProcessRecord {
        &self.processes[index.0]
    }
}

/// Builds [`TraceSources`] from a stream of decoded events
#[derive(Debug, Default)]
pub struct TraceModel {
    sources: TraceSources,
    clock: Option<ClockConverter>,
    live_processes: HashMap<u32, ProcessIndex>,
    live_threads: HashMap<u32, ProcessIndex>,
}

impl TraceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event
    ///
    /// **Public** - main entry point, events must arrive in trace order
    pub fn handle_event(&mut self, event: &DecodedEvent) {
        self.index_stack_origin(event);

        let Some(system) = &event.system else {
            return;
        };
        let timestamp_raw = event.raw.timestamp_raw;

        match system {
            SystemEvent::Header {
                perf_freq,
                clock_type,
                start_file_time,
                cpu_speed_mhz,
            } => {
                self.clock = ClockConverter::from_header(
                    timestamp_raw,
                    *start_file_time,
                    *perf_freq,
                    *clock_type,
                    *cpu_speed_mhz,
                );
            }
            SystemEvent::ProcessStart {
                pid,
                image_file_name,
                rundown,
            } => self.handle_process_start(timestamp_raw, *pid, image_file_name, *rundown),
            SystemEvent::ProcessEnd {
                pid,
                exit_code,
                rundown,
            } => {
                if !rundown {
                    self.handle_process_end(timestamp_raw, *pid, *exit_code);
                }
            }
            SystemEvent::ThreadStart { pid, tid } => self.handle_thread_start(*pid, *tid),
            SystemEvent::ThreadEnd { tid, .. } => {
                self.live_threads.remove(tid);
            }
            SystemEvent::ImageLoad { pid, file_name } => self.handle_image_load(*pid, file_name),
            SystemEvent::SampledProfile { tid } => {
                let process = self.thread_owner(*tid);
                self.sources.cpu_samples.push(CpuSample { process });
            }
            SystemEvent::ContextSwitch { old_tid, new_tid } => {
                let switch_context = ContextSwitch {
                    switch_in: self.thread_owner(*new_tid),
                    switch_out: self.thread_owner(*old_tid),
                };
                self.sources.context_switches.push(switch_context);
            }
            SystemEvent::ReadyThread { tid } => {
                let readied = self.thread_owner(*tid);
                self.sources.ready_threads.push(ReadyThreadEvent { readied });
            }
            SystemEvent::Stack {
                pid,
                tid,
                event_timestamp_raw,
            } => {
                let process = self.live_processes.get(pid).copied();
                self.sources.stacks.push(StackSnapshot {
                    process,
                    thread_id: *tid,
                    event_timestamp_raw: *event_timestamp_raw,
                });
            }
        }
    }

    /// Consume the model and return its data sources
    pub fn finish(self) -> TraceSources {
        debug!(
            "Trace model: {} processes, {} threads, {} samples, {} context switches, {} ready threads, {} stacks",
            self.sources.processes.len(),
            self.sources.threads.len(),
            self.sources.cpu_samples.len(),
            self.sources.context_switches.len(),
            self.sources.ready_threads.len(),
            self.sources.stacks.len()
        );
        self.sources
    }

    /// Remember every event a stack could later refer to
    ///
    /// **Private** - stack walk events themselves are never stack origins
    fn index_stack_origin(&mut self, event: &DecodedEvent) {
        if matches!(event.system, Some(SystemEvent::Stack { .. })) {
            return;
        }

        let stack_event = StackEvent {
            key: event.raw.stack_event_key(),
        };
        let payload_thread = event.system.as_ref().and_then(SystemEvent::payload_thread);
        for tid in candidate_threads(&event.raw, payload_thread) {
            self.sources
                .stack_events
                .insert(tid, event.raw.timestamp_raw, stack_event);
        }
    }

    fn handle_process_start(&mut self, timestamp_raw: u64, pid: u32, image_file_name: &str, rundown: bool) {
        let mut record = ProcessRecord::new(pid, image_file_name);
        if !rundown {
            record.create_time_ms = self.convert_time(timestamp_raw);
        }

        let index = ProcessIndex(self.sources.processes.len());
        self.sources.processes.push(record);

        if let Some(previous) = self.live_processes.insert(pid, index) {
            debug!(
                "Pid {} reused: {} replaces {}",
                pid,
                image_file_name,
                self.sources.process(previous).image_name
            );
        }
    }

    fn handle_process_end(&mut self, timestamp_raw: u64, pid: u32, exit_code: Option<i32>) {
        let exit_time_ms = self.convert_time(timestamp_raw);
        let Some(index) = self.live_processes.get(&pid).copied() else {
            debug!("End of unknown process {}", pid);
            return;
        };

        let record = &mut self.sources.processes[index.0];
        record.exit_time_ms = exit_time_ms;
        record.exit_code = exit_code;
    }

    fn handle_thread_start(&mut self, pid: u32, tid: u32) {
        let Some(process) = self.live_processes.get(&pid).copied() else {
            warn!("Skipping thread {} of unknown pid {}", tid, pid);
            return;
        };

        self.sources.threads.push(ThreadRecord { tid, process });
        self.live_threads.insert(tid, process);
    }

    fn handle_image_load(&mut self, pid: u32, file_name: &str) {
        let Some(index) = self.live_processes.get(&pid).copied() else {
            debug!("Image {} loaded into unknown pid {}", file_name, pid);
            return;
        };

        self.sources.processes[index.0]
            .images
            .push(image_file_name(file_name).to_string());
    }

    fn thread_owner(&self, tid: u32) -> Option<ProcessIndex> {
        self.live_threads.get(&tid).copied()
    }

    fn convert_time(&self, timestamp_raw: u64) -> Option<i64> {
        self.clock.as_ref().map(|clock| clock.to_unix_ms(timestamp_raw))
    }
}

/// Threads a stack captured for `raw` may be attributed to
fn candidate_threads(raw: &RawEvent, payload_thread: Option<u32>) -> impl Iterator<Item = u32> {
    let header_thread = raw.thread_id;
    let payload_thread = payload_thread.filter(|tid| Some(*tid) != header_thread);
    header_thread.into_iter().chain(payload_thread)
}

/// Strip the directory part of a kernel image path
///
/// Kernel paths use backslashes and often a `\Device\HarddiskVolumeN` prefix.
pub fn image_file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn decoded(timestamp_raw: u64, thread_id: Option<u32>, system: Option<SystemEvent>) -> DecodedEvent {
        DecodedEvent::new(
            RawEvent {
                timestamp_raw,
                process_id: None,
                thread_id,
                provider_id: Uuid::from_u128(0xabc),
                id: 3,
                opcode: 0,
                is_trace_logging: false,
                is_classic: false,
            },
            system,
        )
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(
            image_file_name(r"\Device\HarddiskVolume3\Windows\System32\ntdll.dll"),
            "ntdll.dll"
        );
        assert_eq!(image_file_name("kernel32.dll"), "kernel32.dll");
    }

    #[test]
    fn test_thread_of_unknown_process_is_skipped() {
        let mut model = TraceModel::new();
        model.handle_event(&decoded(1, None, Some(SystemEvent::ThreadStart { pid: 77, tid: 1 })));

        let sources = model.finish();
        assert!(sources.threads.is_empty());
    }

    #[test]
    fn test_stack_walk_is_not_a_stack_origin() {
        let mut model = TraceModel::new();
        model.handle_event(&decoded(
            10,
            Some(5),
            Some(SystemEvent::Stack {
                pid: 1,
                tid: 5,
                event_timestamp_raw: 10,
            }),
        ));

        let sources = model.finish();
        assert!(sources.stack_events.get(5, 10).is_none());
        assert_eq!(sources.stacks.len(), 1);
    }

    #[test]
    fn test_payload_thread_is_indexed() {
        let mut model = TraceModel::new();
        model.handle_event(&decoded(42, None, Some(SystemEvent::SampledProfile { tid: 9 })));

        let sources = model.finish();
        assert!(sources.stack_events.get(9, 42).is_some());
        assert!(sources.stack_events.get(9, 43).is_none());
    }
}
