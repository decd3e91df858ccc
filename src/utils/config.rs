//! Configuration and constants for the CLI.

/// Extension accepted for input traces (compared case-insensitively)
pub const ETL_EXTENSION: &str = "etl";

/// Extension selecting the JSON writer
pub const JSON_EXTENSION: &str = "json";

/// Extension selecting the XML writer
pub const XML_EXTENSION: &str = "xml";

/// Pid used when an event carries no process id, and by the unknown process
pub const UNKNOWN_PROCESS_ID: u32 = 0;

/// ETW reports a missing header process/thread id as all ones
pub const ETW_ABSENT_ID: u32 = u32::MAX;

// FILETIME counts 100ns intervals since 1601-01-01
pub const FILETIME_TICKS_PER_SECOND: u64 = 10_000_000;
pub const FILETIME_UNIX_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

// Values of the ReservedFlags field of the trace header
pub const CLOCK_TYPE_QPC: u32 = 1;
pub const CLOCK_TYPE_SYSTEM_TIME: u32 = 2;
pub const CLOCK_TYPE_CPU_CYCLES: u32 = 3;
