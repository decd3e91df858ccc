//! Trace decoding and the data sources rebuilt from it.
//!
//! This module handles:
//! - Decoding ETL files through the Windows trace consumer API
//! - Converting raw timestamps to wall-clock time
//! - Tracking processes, threads and stacks over the lifetime of the trace

pub mod clock;
pub mod events;
pub mod trace_model;

#[cfg(windows)]
mod etl;
#[cfg(windows)]
mod tdh;

// Re-export main types
pub use clock::ClockConverter;
pub use events::{DecodedEvent, EventKey, RawEvent, SystemEvent, TraceEventSink};
pub use trace_model::{ProcessIndex, ProcessRecord, TraceModel, TraceSources};

#[cfg(windows)]
pub use etl::read_etl_file;

/// Decode every event of `etl_path` and hand it to `sink`
///
/// ETL decoding needs the Windows trace consumer API, so on other platforms
/// this always fails.
#[cfg(not(windows))]
pub fn read_etl_file(
    etl_path: &std::path::Path,
    _sink: &mut dyn TraceEventSink,
) -> Result<(), crate::utils::error::TraceError> {
    log::debug!("Cannot decode {} on this platform", etl_path.display());
    Err(crate::utils::error::TraceError::UnsupportedPlatform)
}
