//! Synthetic event streams for integration tests.

#![allow(dead_code)]

use trace_info_dumper::aggregator::{TraceCollector, TraceData};
use trace_info_dumper::parser::{DecodedEvent, RawEvent, SystemEvent, TraceEventSink};
use uuid::Uuid;

pub const EVENT_TRACE: Uuid = Uuid::from_u128(0x68fdd900_4a3e_11d1_84f4_0000f80464e3);
pub const KERNEL_PROCESS: Uuid = Uuid::from_u128(0x3d6fa8d0_fe05_11d0_9dda_00c04fd7ba7c);
pub const KERNEL_THREAD: Uuid = Uuid::from_u128(0x3d6fa8d1_fe05_11d0_9dda_00c04fd7ba7c);
pub const KERNEL_IMAGE: Uuid = Uuid::from_u128(0x2cb15d1d_5fc1_11d2_abe1_00a0c911f518);
pub const PERF_INFO: Uuid = Uuid::from_u128(0xce1dbfb4_137e_4da6_87b0_3f59aa102cbc);
pub const STACK_WALK: Uuid = Uuid::from_u128(0xdef2fe46_7bd6_4b80_bd94_f57fe20d0ce3);
pub const USER_PROVIDER: Uuid = Uuid::from_u128(0x22fb2cd6_0e7b_422b_a0c7_2fad1fd0e716);

// 2021-01-01T00:00:00Z
pub const START_FILE_TIME: i64 = 132_539_328_000_000_000;
pub const START_UNIX_MS: i64 = 1_609_459_200_000;

/// QPC at 1 MHz, so one raw tick is one microsecond
pub const PERF_FREQ: u64 = 1_000_000;

/// Builds a trace event by event, with increasing timestamps
pub struct TraceBuilder {
    events: Vec<DecodedEvent>,
    timestamp: u64,
}

impl TraceBuilder {
    pub fn new() -> Self {
        let mut builder = Self::without_header();
        builder.system(
            None,
            SystemEvent::Header {
                perf_freq: PERF_FREQ,
                clock_type: 1,
                start_file_time: START_FILE_TIME,
                cpu_speed_mhz: 3_000,
            },
        );
        builder
    }

    /// A trace whose clock is never anchored
    pub fn without_header() -> Self {
        Self {
            events: Vec::new(),
            timestamp: 0,
        }
    }

    /// Move the clock forward by `ticks`
    pub fn advance(&mut self, ticks: u64) -> &mut Self {
        self.timestamp += ticks;
        self
    }

    pub fn now(&self) -> u64 {
        self.timestamp
    }

    /// A classic kernel event, shaped the way the ETL decoder builds it
    pub fn system(&mut self, thread_id: Option<u32>, system: SystemEvent) -> &mut Self {
        let (provider_id, opcode) = classic_event_class(&system);
        let raw = RawEvent {
            timestamp_raw: self.timestamp,
            process_id: None,
            thread_id,
            provider_id,
            id: 0,
            opcode,
            is_trace_logging: false,
            is_classic: true,
        };
        self.events.push(DecodedEvent::new(raw, Some(system)));
        self
    }

    pub fn raw(&mut self, raw: RawEvent) -> &mut Self {
        self.events.push(DecodedEvent::new(raw, None));
        self
    }

    /// A user-mode event from `pid`/`tid`
    pub fn user_event(&mut self, pid: Option<u32>, tid: Option<u32>, id: u16) -> &mut Self {
        let raw = RawEvent {
            timestamp_raw: self.timestamp,
            process_id: pid,
            thread_id: tid,
            provider_id: USER_PROVIDER,
            id,
            opcode: 0,
            is_trace_logging: false,
            is_classic: false,
        };
        self.raw(raw)
    }

    pub fn process_start(&mut self, pid: u32, name: &str) -> &mut Self {
        self.system(
            None,
            SystemEvent::ProcessStart {
                pid,
                image_file_name: name.to_string(),
                rundown: false,
            },
        )
    }

    pub fn process_rundown(&mut self, pid: u32, name: &str) -> &mut Self {
        self.system(
            None,
            SystemEvent::ProcessStart {
                pid,
                image_file_name: name.to_string(),
                rundown: true,
            },
        )
    }

    pub fn process_end(&mut self, pid: u32, exit_code: i32) -> &mut Self {
        self.system(
            None,
            SystemEvent::ProcessEnd {
                pid,
                exit_code: Some(exit_code),
                rundown: false,
            },
        )
    }

    pub fn process_end_rundown(&mut self, pid: u32) -> &mut Self {
        self.system(
            None,
            SystemEvent::ProcessEnd {
                pid,
                exit_code: Some(0),
                rundown: true,
            },
        )
    }

    pub fn thread_start(&mut self, pid: u32, tid: u32) -> &mut Self {
        self.system(None, SystemEvent::ThreadStart { pid, tid })
    }

    pub fn thread_end(&mut self, pid: u32, tid: u32) -> &mut Self {
        self.system(None, SystemEvent::ThreadEnd { pid, tid })
    }

    pub fn image_load(&mut self, pid: u32, file_name: &str) -> &mut Self {
        self.system(
            None,
            SystemEvent::ImageLoad {
                pid,
                file_name: file_name.to_string(),
            },
        )
    }

    pub fn sample(&mut self, tid: u32) -> &mut Self {
        self.system(None, SystemEvent::SampledProfile { tid })
    }

    pub fn context_switch(&mut self, old_tid: u32, new_tid: u32) -> &mut Self {
        self.system(None, SystemEvent::ContextSwitch { old_tid, new_tid })
    }

    pub fn ready_thread(&mut self, tid: u32) -> &mut Self {
        self.system(None, SystemEvent::ReadyThread { tid })
    }

    /// A stack captured for the event on `tid` at `event_timestamp_raw`
    pub fn stack(&mut self, pid: u32, tid: u32, event_timestamp_raw: u64) -> &mut Self {
        self.system(
            Some(tid),
            SystemEvent::Stack {
                pid,
                tid,
                event_timestamp_raw,
            },
        )
    }

    /// Feed every event through a collector and aggregate the result
    pub fn gather(&self) -> TraceData {
        let mut collector = TraceCollector::new();
        for event in &self.events {
            collector.handle_event(event.clone());
        }
        let (sources, statistics) = collector.finish();
        TraceData::from_sources(std::path::Path::new("test.etl"), &sources, &statistics)
    }
}

/// Event class GUID and opcode of a kernel payload
fn classic_event_class(system: &SystemEvent) -> (Uuid, u8) {
    match system {
        SystemEvent::Header { .. } => (EVENT_TRACE, 0),
        SystemEvent::ProcessStart { rundown, .. } => (KERNEL_PROCESS, if *rundown { 3 } else { 1 }),
        SystemEvent::ProcessEnd { rundown, .. } => (KERNEL_PROCESS, if *rundown { 4 } else { 2 }),
        SystemEvent::ThreadStart { .. } => (KERNEL_THREAD, 1),
        SystemEvent::ThreadEnd { .. } => (KERNEL_THREAD, 2),
        SystemEvent::ContextSwitch { .. } => (KERNEL_THREAD, 36),
        SystemEvent::ReadyThread { .. } => (KERNEL_THREAD, 50),
        SystemEvent::ImageLoad { .. } => (KERNEL_IMAGE, 10),
        SystemEvent::SampledProfile { .. } => (PERF_INFO, 46),
        SystemEvent::Stack { .. } => (STACK_WALK, 32),
    }
}
