//! ETL file reader built on the Windows trace consumer API.
//!
//! The file is opened with `OpenTraceW` in event-record and raw-timestamp
//! mode and drained with `ProcessTrace`. Each `EVENT_RECORD` is turned into a
//! [`DecodedEvent`]: kernel events the trace model cares about are recognised
//! by their classic event class GUID and opcode, and their payload is read
//! through TDH.

use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use log::{debug, info};
use uuid::Uuid;
use windows::core::{GUID, PWSTR};
use windows::Win32::System::Diagnostics::Etw::{
    CloseTrace, OpenTraceW, ProcessTrace, EVENT_RECORD, EVENT_TRACE_LOGFILEW,
    PROCESS_TRACE_MODE_EVENT_RECORD, PROCESS_TRACE_MODE_RAW_TIMESTAMP,
};

use super::events::{DecodedEvent, RawEvent, SystemEvent, TraceEventSink};
use super::tdh::{PropertyError, PropertyReader};
use crate::utils::config::ETW_ABSENT_ID;
use crate::utils::error::TraceError;

const EVENT_HEADER_FLAG_CLASSIC_HEADER: u16 = 0x0100;
const EVENT_HEADER_EXT_TYPE_EVENT_SCHEMA_TL: u16 = 11;

// Classic kernel event classes
const EVENT_TRACE_GUID: Uuid = Uuid::from_u128(0x68fdd900_4a3e_11d1_84f4_0000f80464e3);
const PROCESS_GUID: Uuid = Uuid::from_u128(0x3d6fa8d0_fe05_11d0_9dda_00c04fd7ba7c);
const THREAD_GUID: Uuid = Uuid::from_u128(0x3d6fa8d1_fe05_11d0_9dda_00c04fd7ba7c);
const IMAGE_GUID: Uuid = Uuid::from_u128(0x2cb15d1d_5fc1_11d2_abe1_00a0c911f518);
const PERF_INFO_GUID: Uuid = Uuid::from_u128(0xce1dbfb4_137e_4da6_87b0_3f59aa102cbc);
const STACK_WALK_GUID: Uuid = Uuid::from_u128(0xdef2fe46_7bd6_4b80_bd94_f57fe20d0ce3);

const OPCODE_HEADER: u8 = 0;
const OPCODE_START: u8 = 1;
const OPCODE_END: u8 = 2;
const OPCODE_DC_START: u8 = 3;
const OPCODE_DC_END: u8 = 4;
const OPCODE_IMAGE_LOAD: u8 = 10;
const OPCODE_STACK_WALK: u8 = 32;
const OPCODE_CSWITCH: u8 = 36;
const OPCODE_SAMPLED_PROFILE: u8 = 46;
const OPCODE_READY_THREAD: u8 = 50;

const INVALID_PROCESSTRACE_HANDLE: u64 = u64::MAX;

/// Decode every event of `etl_path` and hand it to `sink`
///
/// **Public** - main entry point for ETL decoding
///
/// # Errors
/// * `TraceError::OpenFailed` - the file could not be opened as a trace
/// * `TraceError::ProcessingFailed` - the trace consumer reported an error
pub fn read_etl_file(etl_path: &Path, sink: &mut dyn TraceEventSink) -> Result<(), TraceError> {
    let mut event_count = 0u64;
    let mut callback = |record: &EVENT_RECORD| {
        event_count += 1;
        sink.handle_event(decode_record(record));
    };

    open_trace(etl_path, &mut callback)?;

    info!("Decoded {} events", event_count);
    Ok(())
}

unsafe extern "system" fn trace_callback_thunk(event_record: *mut EVENT_RECORD) {
    let callback = &mut *((*event_record).UserContext as *mut &mut dyn FnMut(&EVENT_RECORD));
    callback(&*event_record);
}

fn open_trace(etl_path: &Path, callback: &mut dyn FnMut(&EVENT_RECORD)) -> Result<(), TraceError> {
    let mut wide_path: Vec<u16> = etl_path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let mut callback_ref: &mut dyn FnMut(&EVENT_RECORD) = callback;

    let mut log_file = EVENT_TRACE_LOGFILEW::default();
    log_file.LogFileName = PWSTR(wide_path.as_mut_ptr());
    log_file.Anonymous1.ProcessTraceMode =
        PROCESS_TRACE_MODE_EVENT_RECORD | PROCESS_TRACE_MODE_RAW_TIMESTAMP;
    log_file.Anonymous2.EventRecordCallback = Some(trace_callback_thunk);
    log_file.Context = &mut callback_ref as *mut &mut dyn FnMut(&EVENT_RECORD) as *mut c_void;

    let handle = unsafe { OpenTraceW(&mut log_file) };
    if handle.Value == INVALID_PROCESSTRACE_HANDLE {
        return Err(TraceError::OpenFailed(std::io::Error::last_os_error()));
    }
    debug!("Opened trace {}", etl_path.display());

    let status = unsafe { ProcessTrace(&[handle], None, None) };
    let _ = unsafe { CloseTrace(handle) };

    if status.0 != 0 {
        return Err(TraceError::ProcessingFailed(std::io::Error::from_raw_os_error(
            status.0 as i32,
        )));
    }

    Ok(())
}

fn decode_record(record: &EVENT_RECORD) -> DecodedEvent {
    let header = &record.EventHeader;
    let is_classic = header.Flags & EVENT_HEADER_FLAG_CLASSIC_HEADER != 0;
    let raw = RawEvent {
        timestamp_raw: header.TimeStamp as u64,
        process_id: present_id(header.ProcessId),
        thread_id: present_id(header.ThreadId),
        provider_id: guid_to_uuid(&header.ProviderId),
        id: header.EventDescriptor.Id,
        opcode: header.EventDescriptor.Opcode,
        is_trace_logging: is_trace_logging(record),
        is_classic,
    };

    let system = if is_classic {
        match decode_system_event(record, raw.provider_id, raw.opcode) {
            Ok(system) => system,
            Err(e) => {
                debug!(
                    "Could not decode payload of {} opcode {}: {:?}",
                    raw.provider_id, raw.opcode, e
                );
                None
            }
        }
    } else {
        None
    };

    DecodedEvent::new(raw, system)
}

fn decode_system_event(
    record: &EVENT_RECORD,
    provider_id: Uuid,
    opcode: u8,
) -> Result<Option<SystemEvent>, PropertyError> {
    let parser = PropertyReader::new(record);

    let event = match (provider_id, opcode) {
        (EVENT_TRACE_GUID, OPCODE_HEADER) => SystemEvent::Header {
            perf_freq: parser.u64("PerfFreq")?,
            clock_type: parser.u32("ReservedFlags")?,
            start_file_time: parser.i64("StartTime")?,
            cpu_speed_mhz: parser.u32("CpuSpeed").unwrap_or(0),
        },
        (PROCESS_GUID, OPCODE_START | OPCODE_DC_START) => SystemEvent::ProcessStart {
            pid: parser.u32("ProcessId")?,
            image_file_name: parser.ansi_string("ImageFileName")?,
            rundown: opcode == OPCODE_DC_START,
        },
        (PROCESS_GUID, OPCODE_END | OPCODE_DC_END) => SystemEvent::ProcessEnd {
            pid: parser.u32("ProcessId")?,
            exit_code: parser.u32("ExitStatus").ok().map(|status| status as i32),
            rundown: opcode == OPCODE_DC_END,
        },
        (THREAD_GUID, OPCODE_START | OPCODE_DC_START) => SystemEvent::ThreadStart {
            pid: parser.u32("ProcessId")?,
            tid: parser.u32("TThreadId")?,
        },
        (THREAD_GUID, OPCODE_END) => SystemEvent::ThreadEnd {
            pid: parser.u32("ProcessId")?,
            tid: parser.u32("TThreadId")?,
        },
        (THREAD_GUID, OPCODE_CSWITCH) => SystemEvent::ContextSwitch {
            old_tid: parser.u32("OldThreadId")?,
            new_tid: parser.u32("NewThreadId")?,
        },
        (THREAD_GUID, OPCODE_READY_THREAD) => SystemEvent::ReadyThread {
            tid: parser.u32("TThreadId")?,
        },
        (IMAGE_GUID, OPCODE_IMAGE_LOAD | OPCODE_DC_START) => SystemEvent::ImageLoad {
            pid: parser.u32("ProcessId")?,
            file_name: parser.unicode_string("FileName")?,
        },
        (PERF_INFO_GUID, OPCODE_SAMPLED_PROFILE) => SystemEvent::SampledProfile {
            tid: parser.u32("ThreadId")?,
        },
        (STACK_WALK_GUID, OPCODE_STACK_WALK) => SystemEvent::Stack {
            pid: parser.u32("StackProcess")?,
            tid: parser.u32("StackThread")?,
            event_timestamp_raw: parser.u64("EventTimeStamp")?,
        },
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn is_trace_logging(record: &EVENT_RECORD) -> bool {
    if record.ExtendedData.is_null() {
        return false;
    }

    let items = unsafe {
        std::slice::from_raw_parts(record.ExtendedData, usize::from(record.ExtendedDataCount))
    };
    items
        .iter()
        .any(|item| item.ExtType == EVENT_HEADER_EXT_TYPE_EVENT_SCHEMA_TL)
}

fn present_id(id: u32) -> Option<u32> {
    (id != ETW_ABSENT_ID).then_some(id)
}

fn guid_to_uuid(guid: &GUID) -> Uuid {
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}
