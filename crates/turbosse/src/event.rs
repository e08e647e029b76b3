//! Server-Sent Event records and the field-line parser.
//!
//! The parser works on one transport chunk at a time and splits it on `\n`.
//! It does not buffer across chunks: a field split over two deliveries is read
//! as two independent (usually malformed) lines. Servers that flush whole lines
//! per write are unaffected.
//!
//! ```rust
//! use turbosse::Event;
//!
//! let events = Event::parse(b"id: 42\nevent: greeting\ndata: hi\n");
//! assert_eq!(events[0], Event::Id(Some("42".to_string())));
//! assert_eq!(events[1], Event::EventType("greeting".to_string()));
//! assert_eq!(events[2].text(), Some("hi"));
//! ```

use std::fmt;

use bytes::Bytes;

/// One field line of an event stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    /// Sets the resumption id; `None` clears it.
    Id(Option<String>),
    /// Names the event.
    EventType(String),
    /// Event payload, byte for byte.
    Data(Bytes),
    /// Server-suggested reconnect delay in milliseconds.
    Retry(u64),
}

impl Event {
    /// Decodes every recognizable field line in `chunk`, in order.
    ///
    /// Never fails: comments, unknown fields and malformed values contribute
    /// nothing.
    pub fn parse(chunk: &[u8]) -> Vec<Event> {
        chunk.split(|b| *b == b'\n').filter_map(parse_line).collect()
    }

    /// The wire field name of this event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Id(_) => "id",
            Self::EventType(_) => "event",
            Self::Data(_) => "data",
            Self::Retry(_) => "retry",
        }
    }

    /// The payload as UTF-8 text, for `Data` events with a valid UTF-8 payload.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Data(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Returns `true` if this is a `Data` event whose payload contains `token`.
    pub fn contains(&self, token: &[u8]) -> bool {
        match self {
            Self::Data(data) => contains_subsequence(data, token),
            _ => false,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(Some(id)) => write!(f, "id: {id}"),
            Self::Id(None) => write!(f, "id"),
            Self::EventType(name) => write!(f, "event: {name}"),
            Self::Data(data) => write!(f, "data: {}", String::from_utf8_lossy(data)),
            Self::Retry(ms) => write!(f, "retry: {ms}"),
        }
    }
}

/// Returns `true` if `token` occurs in `haystack` as a contiguous run.
///
/// An empty token never matches.
pub(crate) fn contains_subsequence(haystack: &[u8], token: &[u8]) -> bool {
    !token.is_empty() && haystack.windows(token.len()).any(|window| window == token)
}

fn parse_line(line: &[u8]) -> Option<Event> {
    if line.first() == Some(&b':') {
        return None;
    }

    let (field, value) = match line.iter().position(|b| *b == b':') {
        Some(colon) => (&line[..colon], Some(&line[colon + 1..])),
        None => (line, None),
    };
    let field = std::str::from_utf8(field).ok()?.trim().to_lowercase();

    match field.as_str() {
        "id" => {
            let id = value
                .and_then(decode_trimmed)
                .filter(|id| !id.is_empty())
                .map(str::to_owned);
            Some(Event::Id(id))
        }
        "event" => value
            .and_then(decode_trimmed)
            .map(|name| Event::EventType(name.to_owned())),
        // A single space after the colon belongs to the field syntax, not the payload.
        "data" => value.map(|data| {
            Event::Data(Bytes::copy_from_slice(
                data.strip_prefix(b" ").unwrap_or(data),
            ))
        }),
        "retry" => value
            .and_then(decode_trimmed)
            .and_then(|ms| ms.parse().ok())
            .map(Event::Retry),
        _ => None,
    }
}

fn decode_trimmed(value: &[u8]) -> Option<&str> {
    std::str::from_utf8(value).ok().map(str::trim)
}
