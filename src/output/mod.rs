//! Output writers for trace info documents.
//!
//! This module handles writing gathered data to disk:
//! - JSON documents (pretty-printed, serde)
//! - XML documents (same fields and order)

pub mod json;
pub mod schema;
pub mod xml;

use crate::aggregator::TraceData;
use crate::utils::config::{JSON_EXTENSION, XML_EXTENSION};
use crate::utils::error::OutputError;
use log::debug;
use std::path::Path;

// Re-export main functions
pub use json::{document_to_json, read_document, write_json};
pub use schema::TraceInfoDocument;
pub use xml::{document_to_xml, write_xml};

/// Output file formats, selected by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Xml,
}

impl OutputFormat {
    /// Pick the format from the extension of `path` (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case(JSON_EXTENSION) {
            Some(OutputFormat::Json)
        } else if extension.eq_ignore_ascii_case(XML_EXTENSION) {
            Some(OutputFormat::Xml)
        } else {
            None
        }
    }
}

/// Write gathered trace data in the format selected by `output_path`
///
/// **Public** - main entry point for output
///
/// # Errors
/// * `OutputError::UnsupportedFormat` - extension is neither json nor xml
/// * Any error of the selected writer
pub fn write_trace_data(data: &TraceData, output_path: &Path) -> Result<(), OutputError> {
    let format = OutputFormat::from_path(output_path)
        .ok_or_else(|| OutputError::UnsupportedFormat(output_path.to_path_buf()))?;
    let document = TraceInfoDocument::from(data);

    match format {
        OutputFormat::Json => write_json(&document, output_path),
        OutputFormat::Xml => write_xml(&document, output_path),
    }
}

/// Check that an output path is usable
///
/// **Public** - also used for argument validation
pub fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Validate the path and create missing parent directories
///
/// **Private** - shared by the writers
fn prepare_output_path(path: &Path) -> Result<(), OutputError> {
    validate_output_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

/// **Private** - size of a written file, 0 if it cannot be read
fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
