//! XML document writer.
//!
//! The document is small and flat, so the markup is written by hand. Element
//! names mirror the JSON field names.

use super::schema::{EventCountEntry, ProcessCountEntry, ProcessEntry, TraceInfoDocument};
use super::{file_size, prepare_output_path};
use crate::utils::error::OutputError;
use log::info;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const INDENT: &str = "  ";

/// Write a document to an XML file
///
/// **Public** - main entry point for XML output
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_xml(document: &TraceInfoDocument, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing XML to: {}", output_path.display());
    prepare_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(document_to_xml(document).as_bytes())
        .map_err(OutputError::WriteFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    info!("XML written successfully ({} bytes)", file_size(output_path));

    Ok(())
}

/// Render a document as XML
pub fn document_to_xml(document: &TraceInfoDocument) -> String {
    let data = &document.data;
    let mut xml = XmlBuilder::new();

    xml.line(0, r#"<?xml version="1.0" encoding="utf-8"?>"#);
    xml.line(0, &format!(r#"<traceData etlPath="{}">"#, escape(&document.etl_path)));

    xml.section("processList", &data.process_list, |xml, process| {
        xml.line(2, &format!("{}/>", process_open_tag(process)));
    });

    xml.section("processLifetimeInfoList", &data.process_lifetime_info_list, |xml, entry| {
        let info = &entry.lifetime_info;
        let mut attributes = String::new();
        if let Some(start) = info.start_time_ms_stamp {
            let _ = write!(attributes, r#" startTimeMsStamp="{}""#, start);
        }
        if let Some(end) = info.end_time_ms_stamp {
            let _ = write!(attributes, r#" endTimeMsStamp="{}""#, end);
        }
        if let Some(exit_code) = info.exit_code {
            let _ = write!(attributes, r#" exitCode="{}""#, exit_code);
        }
        xml.process(&entry.process, |xml| {
            xml.line(3, &format!("<lifetimeInfo{}/>", attributes));
        });
    });

    xml.section("imageLists", &data.image_lists, |xml, entry| {
        xml.process(&entry.process, |xml| {
            for image in &entry.image_list {
                xml.line(3, &format!(r#"<image name="{}"/>"#, escape(image)));
            }
        });
    });

    xml.section("threadLists", &data.thread_lists, |xml, entry| {
        xml.process(&entry.process, |xml| {
            for tid in &entry.thread_list {
                xml.line(3, &format!(r#"<thread tid="{}"/>"#, tid));
            }
        });
    });

    xml.count_section("sampledProfileCounts", &data.sampled_profile_counts);
    xml.count_section("contextSwitchCounts", &data.context_switch_counts);
    xml.count_section("readyThreadCounts", &data.ready_thread_counts);

    xml.section("stackCounts", &data.stack_counts, |xml, entry| {
        xml.process(&entry.process, |xml| xml.events(&entry.stack_counts_by_provider_and_id));
    });

    xml.section("generalEventCounts", &data.general_event_counts, |xml, entry| {
        xml.process(&entry.process, |xml| {
            xml.events(&entry.general_event_counts_by_provider_and_id)
        });
    });

    xml.line(0, "</traceData>");
    xml.finish()
}

/// Escape a value for use in attributes and text
///
/// Control characters that XML 1.0 does not allow are dropped.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\t' | '\n' | '\r' => escaped.push(c),
            c if c < ' ' => {}
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn process_open_tag(process: &ProcessEntry) -> String {
    format!(
        r#"<process imageName="{}" pid="{}""#,
        escape(&process.image_name),
        process.pid
    )
}

struct XmlBuilder {
    buffer: String,
}

impl XmlBuilder {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn line(&mut self, depth: usize, content: &str) {
        for _ in 0..depth {
            self.buffer.push_str(INDENT);
        }
        self.buffer.push_str(content);
        self.buffer.push('\n');
    }

    /// A list element, written self-closing when empty
    fn section<T>(&mut self, name: &str, items: &[T], mut write_item: impl FnMut(&mut Self, &T)) {
        if items.is_empty() {
            self.line(1, &format!("<{}/>", name));
            return;
        }

        self.line(1, &format!("<{}>", name));
        for item in items {
            write_item(self, item);
        }
        self.line(1, &format!("</{}>", name));
    }

    /// A `<process>` record at depth 2 wrapping the children written by `body`
    fn process(&mut self, process: &ProcessEntry, body: impl FnOnce(&mut Self)) {
        self.line(2, &format!("{}>", process_open_tag(process)));
        body(self);
        self.line(2, "</process>");
    }

    fn count_section(&mut self, name: &str, entries: &[ProcessCountEntry]) {
        self.section(name, entries, |xml, entry| {
            xml.process(&entry.process, |xml| {
                xml.line(3, &format!("<count>{}</count>", entry.count));
            });
        });
    }

    fn events(&mut self, events: &[EventCountEntry]) {
        for event in events {
            self.line(
                3,
                &format!(
                    r#"<event providerId="{}" eventId="{}" count="{}"/>"#,
                    event.provider_id, event.event_id, event.count
                ),
            );
        }
    }

    fn finish(self) -> String {
        self.buffer
    }
}
