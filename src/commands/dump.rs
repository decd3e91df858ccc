//! Dump command implementation.
//!
//! The dump command:
//! 1. Decodes the ETL file and aggregates it per process
//! 2. Writes the result as JSON or XML, picked by the output extension

use crate::aggregator::trace_data::has_etl_extension;
use crate::aggregator::TraceData;
use crate::output::{validate_output_path, write_trace_data, OutputFormat};
use crate::utils::error::ValidationError;
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Arguments for the dump command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArgs {
    /// ETL file to read
    pub input: PathBuf,

    /// JSON or XML file to write
    pub output: PathBuf,
}

/// Execute the dump command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Trace decoding failures, with the "Unable to gather data" context
/// * File write errors, with the "Unable to write result file" context
pub fn execute_dump(args: &DumpArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Step 1/2: Gathering data from {}...", args.input.display());
    let data = TraceData::gather(&args.input).context("Unable to gather data from the ETL file")?;

    info!("Step 2/2: Writing {}...", args.output.display());
    write_trace_data(&data, &args.output).context("Unable to write result file")?;

    info!("Done in {:.2?}", start_time.elapsed());
    Ok(())
}

/// Validate dump arguments before any work is done
///
/// **Public** - should be called before execute_dump
///
/// # Errors
/// * `ValidationError::InvalidInput` - input is missing or not an ETL file
/// * `ValidationError::InvalidOutput` - output is not a usable JSON or XML path
pub fn validate_args(args: &DumpArgs) -> Result<(), ValidationError> {
    if !is_valid_input(&args.input) {
        return Err(ValidationError::InvalidInput(args.input.clone()));
    }

    if !is_valid_output(&args.output) {
        return Err(ValidationError::InvalidOutput(args.output.clone()));
    }

    Ok(())
}

fn is_valid_input(path: &Path) -> bool {
    has_etl_extension(path) && path.is_file()
}

fn is_valid_output(path: &Path) -> bool {
    validate_output_path(path).is_ok() && OutputFormat::from_path(path).is_some()
}
