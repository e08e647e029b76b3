//! Event output formatting.

use std::io::Write;

use serde_json::{Value, json};
use turbosse::Event;

use crate::error::CliResult;

/// How events are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Wire form, one field per line.
    Human,
    /// One JSON object per line.
    Json,
}

/// Writes one event in the given format, followed by a newline.
pub fn write_event(out: &mut impl Write, event: &Event, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Human => writeln!(out, "{event}")?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, &event_json(event))?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// JSON shape of an event: `{"field": ..., "value": ...}`.
///
/// Data that is not valid UTF-8 is rendered lossily.
pub fn event_json(event: &Event) -> Value {
    let value = match event {
        Event::Id(id) => json!(id),
        Event::EventType(name) => json!(name),
        Event::Data(data) => json!(String::from_utf8_lossy(data)),
        Event::Retry(ms) => json!(ms),
    };
    json!({ "field": event.name(), "value": value })
}
