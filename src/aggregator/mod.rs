//! Aggregation of the decoded trace into per-process statistics.
//!
//! This module turns the data sources and raw event counters into:
//! - The process table, lifetimes, image and thread lists
//! - Sampled-profile, context-switch and ready-thread counts
//! - Stack and general event counts by provider and id

pub mod collector;
pub mod event_statistics;
pub mod process_table;
pub mod scheduling;
pub mod stacks;
pub mod trace_data;

// Re-export main types and functions
pub use collector::TraceCollector;
pub use event_statistics::{merge_counts, reconcile, EventCounts, EventStatistics};
pub use process_table::{Process, ProcessLifetimeInfo, ProcessTable};
pub use scheduling::{record_context_switch, ProcessCounts};
pub use trace_data::TraceData;
