//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while validating command line arguments
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid arguments")]
    InvalidArguments,

    #[error("Invalid input file argument")]
    InvalidInput(PathBuf),

    #[error("Invalid output file argument")]
    InvalidOutput(PathBuf),
}

/// Errors that can occur while reading a trace file
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Input must be an ETL file: {0}")]
    NotAnEtlFile(PathBuf),

    #[error("Failed to open trace: {0}")]
    OpenFailed(#[source] std::io::Error),

    #[error("Failed to process trace: {0}")]
    ProcessingFailed(#[source] std::io::Error),

    #[error("ETL decoding is only available on Windows")]
    UnsupportedPlatform,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Output must be a json or xml file: {0}")]
    UnsupportedFormat(PathBuf),
}
