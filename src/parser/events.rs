//! Decoded event stream produced by the ETL reader.
//!
//! Every event record in a trace becomes one [`DecodedEvent`]: the header
//! view that every record has ([`RawEvent`]), plus the kernel payload when the
//! record is one of the system events the trace model tracks.

use uuid::Uuid;

/// Identifies an event type within a trace: provider GUID plus numeric id
///
/// Classic kernel events and TraceLogging (self-describing) events always
/// report id 0 on the wire, so their opcode is stored in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub provider_id: Uuid,
    pub id: u16,
}

impl EventKey {
    pub fn new(provider_id: Uuid, id: u16) -> Self {
        Self { provider_id, id }
    }
}

/// Header-level view of a single event record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Raw timestamp in trace clock ticks
    pub timestamp_raw: u64,

    /// Process id from the event header, if the event has one
    pub process_id: Option<u32>,

    /// Thread id from the event header, if the event has one
    pub thread_id: Option<u32>,

    pub provider_id: Uuid,

    /// Event id from the event descriptor
    pub id: u16,

    pub opcode: u8,

    /// Set for self-describing events, whose id is always 0
    pub is_trace_logging: bool,

    /// Set for classic (MOF) events, which carry their event type in the opcode
    pub is_classic: bool,
}

impl RawEvent {
    /// Key used for general event statistics
    ///
    /// Classic and TraceLogging events substitute the opcode for the id, so
    /// that events of the same provider stay distinguishable.
    pub fn event_key(&self) -> EventKey {
        let id = if self.is_classic || self.is_trace_logging {
            u16::from(self.opcode)
        } else {
            self.id
        };
        EventKey::new(self.provider_id, id)
    }

    /// Key used when this event is the origin of a captured stack
    ///
    /// Classic events are keyed by opcode. Stack attribution cannot tell
    /// TraceLogging events apart, so their id stays 0.
    pub fn stack_event_key(&self) -> EventKey {
        let id = if self.is_classic {
            u16::from(self.opcode)
        } else {
            self.id
        };
        EventKey::new(self.provider_id, id)
    }
}

/// Kernel payloads needed to rebuild processes, threads and scheduling data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// First event of every trace, anchors raw timestamps to wall-clock time
    Header {
        perf_freq: u64,
        clock_type: u32,
        /// Trace start as a FILETIME
        start_file_time: i64,
        cpu_speed_mhz: u32,
    },

    /// `rundown` is set for processes that already existed when tracing began
    ProcessStart {
        pid: u32,
        image_file_name: String,
        rundown: bool,
    },

    /// `rundown` is set for processes still alive when tracing stopped
    ProcessEnd {
        pid: u32,
        exit_code: Option<i32>,
        rundown: bool,
    },

    ThreadStart {
        pid: u32,
        tid: u32,
    },

    ThreadEnd {
        pid: u32,
        tid: u32,
    },

    ImageLoad {
        pid: u32,
        file_name: String,
    },

    SampledProfile {
        tid: u32,
    },

    ContextSwitch {
        old_tid: u32,
        new_tid: u32,
    },

    ReadyThread {
        tid: u32,
    },

    /// A captured call stack, tied to its origin by thread and timestamp
    Stack {
        pid: u32,
        tid: u32,
        event_timestamp_raw: u64,
    },
}

impl SystemEvent {
    /// Thread that a stack captured for this event would be attributed to,
    /// when the payload names one explicitly
    pub fn payload_thread(&self) -> Option<u32> {
        match self {
            SystemEvent::SampledProfile { tid } | SystemEvent::ReadyThread { tid } => Some(*tid),
            SystemEvent::ContextSwitch { new_tid, .. } => Some(*new_tid),
            _ => None,
        }
    }
}

/// One event record as handed over by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub raw: RawEvent,
    pub system: Option<SystemEvent>,
}

impl DecodedEvent {
    pub fn new(raw: RawEvent, system: Option<SystemEvent>) -> Self {
        Self { raw, system }
    }
}

/// Receives decoded events in trace order
pub trait TraceEventSink {
    fn handle_event(&mut self, event: DecodedEvent);
}
