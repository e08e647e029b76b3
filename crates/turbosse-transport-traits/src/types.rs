//! Core transport types.

use std::fmt;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use tokio::task::AbortHandle;
use url::Url;

use crate::error::{TransportError, TransportResult};

/// `Accept` value sent on every streaming request.
pub const ACCEPT_EVENT_STREAM: &str = "text/event-stream";

/// `Cache-Control` value sent on every streaming request.
pub const CACHE_CONTROL_NO_CACHE: &str = "no-cache";

/// Resumption header carrying the last seen event id.
pub const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// A body-less HTTP request describing one streaming exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    /// The HTTP method (almost always `GET`).
    pub method: Method,

    /// The target URL.
    pub url: Url,

    /// Request headers, including any caller-supplied custom headers.
    pub headers: HeaderMap,
}

impl StreamRequest {
    /// Creates a `GET` request for `url` with no headers.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Parses `url` and creates a `GET` request for it.
    pub fn parse(url: &str) -> TransportResult<Self> {
        Ok(Self::get(Url::parse(url)?))
    }

    /// Replaces the request method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets a header, replacing any existing values for the same name.
    pub fn header(mut self, name: &str, value: &str) -> TransportResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Applies the headers every event-stream request carries.
    ///
    /// `Accept` and `Cache-Control` are always overwritten. `Last-Event-Id` is
    /// set when an id is known and removed otherwise, so a cleared resumption
    /// id never lingers on a reissued request. An id that is not a valid header
    /// value is dropped.
    #[must_use]
    pub fn with_stream_headers(mut self, last_event_id: Option<&str>) -> Self {
        self.headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(ACCEPT_EVENT_STREAM),
        );
        self.headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
        );

        self.headers.remove(LAST_EVENT_ID);
        if let Some(id) = last_event_id
            && let Ok(value) = HeaderValue::from_str(id)
        {
            self.headers.insert(LAST_EVENT_ID, value);
        }
        self
    }

    /// Copies every header present on `previous` onto this request.
    ///
    /// Values from `previous` replace values of the same name already present
    /// here; multi-valued headers are copied in full.
    #[must_use]
    pub fn merge_headers_from(mut self, previous: &StreamRequest) -> Self {
        for name in previous.headers.keys() {
            self.headers.remove(name);
            for value in previous.headers.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
        self
    }

    /// Returns the `Last-Event-Id` currently attached to the request.
    pub fn last_event_id(&self) -> Option<&str> {
        self.headers
            .get(LAST_EVENT_ID)
            .and_then(|v| v.to_str().ok())
    }
}

impl fmt::Display for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Identifies one in-flight exchange issued by a [`Transport`](crate::Transport).
#[derive(Debug)]
pub struct ExchangeHandle {
    id: u64,
    abort: Option<AbortHandle>,
}

impl ExchangeHandle {
    /// Creates a handle that has nothing to abort (for transports that do not
    /// spawn tasks).
    pub const fn new(id: u64) -> Self {
        Self { id, abort: None }
    }

    /// Creates a handle that aborts the given task on cancel.
    pub const fn with_abort(id: u64, abort: AbortHandle) -> Self {
        Self {
            id,
            abort: Some(abort),
        }
    }

    /// The transport-assigned exchange id.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Aborts the exchange task, if any.
    pub fn abort(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Returns `true` once the exchange task has finished or been aborted.
    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().is_none_or(AbortHandle::is_finished)
    }
}
