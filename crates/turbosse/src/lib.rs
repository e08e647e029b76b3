//! # TurboSSE
//!
//! Server-Sent Events client core: a lenient field-line parser and a connection
//! state machine that keeps one logical event stream alive across reconnects.
//!
//! ## Overview
//!
//! - [`Event`] and [`Event::parse`] decode raw body bytes into typed field
//!   records. Parsing never fails; unrecognized lines are dropped.
//! - [`Session`] is the sans-I/O state machine: connection phase, resumption
//!   id, done-token detection, redirect header propagation and the reconnect
//!   policy.
//! - [`EventSource`] runs a session against any [`Transport`] on a Tokio task
//!   and exposes the result as a [`futures::Stream`].
//!
//! ## Reconnect policy
//!
//! A completed exchange is reissued, carrying the latest `Last-Event-Id`, when
//! its status falls in `201..300`, or `200..300` when a done token is
//! configured, and the done token has not been seen. Anything else completes
//! the stream.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use turbosse::{EventSource, EventSourceConfig, StreamRequest};
//!
//! let request = StreamRequest::parse("https://example.com/completions")?
//!     .header("Authorization", "Bearer token")?;
//! let config = EventSourceConfig::default().with_done_token("[DONE]");
//!
//! let mut source = EventSource::connect_http(request, config)?;
//! while let Some(event) = source.next().await {
//!     if let Some(text) = event?.text() {
//!         print!("{text}");
//!     }
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod source;

pub use config::{EventSourceConfig, ReconnectDelay};
pub use error::{EventSourceError, EventSourceResult};
pub use event::Event;
pub use session::{Action, ConnectionPhase, Session, SessionSnapshot};
pub use source::{EventSource, EventSourceHandle, EventStream};

// Re-export the transport contract so callers need only this crate
pub use turbosse_transport_traits::{
    ExchangeHandle, StreamRequest, TimeoutConfig, TlsConfig, Transport, TransportConfig,
    TransportError, TransportEvent, TransportEventSender, TransportMetrics, TransportResult,
    transport_channel,
};

#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub use turbosse_http::HttpTransport;
