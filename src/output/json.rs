//! JSON document writer.
//!
//! Writes trace info documents as pretty-printed JSON.

use super::schema::TraceInfoDocument;
use super::{file_size, prepare_output_path};
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write a document to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `document` - Document to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_json(document: &TraceInfoDocument, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing JSON to: {}", output_path.display());
    prepare_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, document).map_err(OutputError::SerializationFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    info!("JSON written successfully ({} bytes)", file_size(output_path));

    Ok(())
}

/// Serialize a document to a pretty-printed JSON string
pub fn document_to_json(document: &TraceInfoDocument) -> Result<String, OutputError> {
    serde_json::to_string_pretty(document).map_err(OutputError::SerializationFailed)
}

/// Read a document back from a JSON file
///
/// **Public** - useful for validation and testing
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_document(input_path: impl AsRef<Path>) -> Result<TraceInfoDocument, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading document from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let document: TraceInfoDocument =
        serde_json::from_reader(file).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Document loaded: {} processes from {}",
        document.data.process_list.len(),
        document.etl_path
    );

    Ok(document)
}
