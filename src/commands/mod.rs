//! CLI command implementations.
//!
//! Commands orchestrate the various library components to perform user tasks.

pub mod dump;

// Re-export main command functions
pub use dump::{execute_dump, validate_args, DumpArgs};
