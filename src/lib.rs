//! Trace Info Dumper
//!
//! Reads a Windows Event Trace Log (ETL) file, aggregates per-process
//! statistics (lifetimes, images, threads, scheduling counts, stack and
//! event counts) and writes them as JSON or XML, for use as test fixtures.
//!
//! The pipeline is:
//! - [`parser`] decodes the trace and rebuilds processes, threads and stacks
//! - [`aggregator`] reconciles raw pids and counts everything per process
//! - [`output`] serializes the result

pub mod aggregator;
pub mod commands;
pub mod output;
pub mod parser;
pub mod utils;
