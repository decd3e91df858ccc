//! Conversion of raw trace timestamps to Unix epoch milliseconds.
//!
//! Events carry timestamps in the trace's own clock (QPC ticks, system time
//! or CPU cycles, depending on how the session was configured). The header
//! event tells us which clock was used, its frequency, and the wall-clock
//! time at which tracing started.

use crate::utils::config::{
    CLOCK_TYPE_CPU_CYCLES, CLOCK_TYPE_QPC, CLOCK_TYPE_SYSTEM_TIME, FILETIME_TICKS_PER_SECOND,
    FILETIME_UNIX_EPOCH_OFFSET,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};

/// Maps raw timestamps onto wall-clock time, anchored at the trace header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConverter {
    reference_raw: u64,
    reference_unix_ms: i64,
    ticks_per_second: u64,
}

impl ClockConverter {
    /// Build a converter from the fields of the trace header event
    ///
    /// **Public** - called by the trace model when the header arrives
    ///
    /// # Arguments
    /// * `reference_raw` - Raw timestamp of the header event
    /// * `start_file_time` - Trace start time as a FILETIME
    /// * `perf_freq` - QPC frequency reported by the header
    /// * `clock_type` - Clock used for raw timestamps
    /// * `cpu_speed_mhz` - CPU speed, used for the cycle counter clock
    ///
    /// # Returns
    /// None if the clock type is unknown or its frequency is zero
    pub fn from_header(
        reference_raw: u64,
        start_file_time: i64,
        perf_freq: u64,
        clock_type: u32,
        cpu_speed_mhz: u32,
    ) -> Option<Self> {
        let ticks_per_second = match clock_type {
            CLOCK_TYPE_QPC => perf_freq,
            CLOCK_TYPE_SYSTEM_TIME => FILETIME_TICKS_PER_SECOND,
            CLOCK_TYPE_CPU_CYCLES => u64::from(cpu_speed_mhz) * 1_000_000,
            other => {
                warn!("Unknown trace clock type {}, timestamps will be omitted", other);
                return None;
            }
        };

        if ticks_per_second == 0 {
            warn!("Trace clock reports a zero frequency, timestamps will be omitted");
            return None;
        }

        let reference_unix_ms = file_time_to_unix_ms(start_file_time);
        if let Some(start) = DateTime::<Utc>::from_timestamp_millis(reference_unix_ms) {
            debug!("Trace started at {} (clock type {})", start.to_rfc3339(), clock_type);
        }

        Some(Self {
            reference_raw,
            reference_unix_ms,
            ticks_per_second,
        })
    }

    /// Convert a raw timestamp to milliseconds since the Unix epoch
    pub fn to_unix_ms(&self, timestamp_raw: u64) -> i64 {
        let delta_ticks = i128::from(timestamp_raw) - i128::from(self.reference_raw);
        let delta_ms = delta_ticks * 1000 / i128::from(self.ticks_per_second);
        let unix_ms = i128::from(self.reference_unix_ms) + delta_ms;
        unix_ms.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

/// Convert a FILETIME (100ns ticks since 1601) to Unix epoch milliseconds
pub fn file_time_to_unix_ms(file_time: i64) -> i64 {
    let since_unix_epoch = file_time.saturating_sub(FILETIME_UNIX_EPOCH_OFFSET);
    let ticks_per_ms = (FILETIME_TICKS_PER_SECOND / 1000) as i64;
    since_unix_epoch.div_euclid(ticks_per_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2021-01-01T00:00:00Z
    const START_FILE_TIME: i64 = 132_539_328_000_000_000;
    const START_UNIX_MS: i64 = 1_609_459_200_000;

    #[test]
    fn test_file_time_to_unix_ms() {
        assert_eq!(file_time_to_unix_ms(FILETIME_UNIX_EPOCH_OFFSET), 0);
        assert_eq!(file_time_to_unix_ms(START_FILE_TIME), START_UNIX_MS);
    }

    #[test]
    fn test_qpc_conversion() {
        let clock = ClockConverter::from_header(5_000, START_FILE_TIME, 10_000_000, CLOCK_TYPE_QPC, 0)
            .unwrap();

        assert_eq!(clock.to_unix_ms(5_000), START_UNIX_MS);
        // 2.5 seconds later
        assert_eq!(clock.to_unix_ms(25_005_000), START_UNIX_MS + 2_500);
    }

    #[test]
    fn test_cpu_cycle_conversion() {
        let clock =
            ClockConverter::from_header(0, START_FILE_TIME, 0, CLOCK_TYPE_CPU_CYCLES, 2_000).unwrap();
        assert_eq!(clock.to_unix_ms(2_000_000_000), START_UNIX_MS + 1_000);
    }

    #[test]
    fn test_system_time_conversion() {
        // raw timestamps are FILETIME ticks, perf_freq is ignored
        let clock =
            ClockConverter::from_header(100, START_FILE_TIME, 0, CLOCK_TYPE_SYSTEM_TIME, 0).unwrap();
        assert_eq!(clock.to_unix_ms(100 + 30_000_000), START_UNIX_MS + 3_000);
    }

    #[test]
    fn test_timestamp_before_reference() {
        let clock = ClockConverter::from_header(1_000_000, START_FILE_TIME, 1_000_000, CLOCK_TYPE_QPC, 0)
            .unwrap();
        assert_eq!(clock.to_unix_ms(0), START_UNIX_MS - 1_000);
    }

    #[test]
    fn test_unusable_clocks() {
        assert!(ClockConverter::from_header(0, START_FILE_TIME, 0, CLOCK_TYPE_QPC, 0).is_none());
        assert!(ClockConverter::from_header(0, START_FILE_TIME, 1_000, 42, 0).is_none());
    }
}
