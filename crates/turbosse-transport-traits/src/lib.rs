//! # TurboSSE Transport Traits
//!
//! The narrow contract between the TurboSSE event source and the streaming HTTP
//! transport that feeds it.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Traits**: [`Transport`]
//! - **Types**: [`StreamRequest`], [`ExchangeHandle`]
//! - **Callbacks**: [`TransportEvent`], [`TransportEventSender`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`TimeoutConfig`], [`TlsConfig`], [`TransportConfig`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//!
//! ## Usage
//!
//! A transport receives a [`StreamRequest`] and reports everything that happens
//! to the exchange through the [`TransportEventSender`] it was handed. Events
//! are delivered in order over a single channel, so the consumer never observes
//! two callbacks at the same time.
//!
//! ```rust,ignore
//! use turbosse_transport_traits::{ExchangeHandle, StreamRequest, Transport, TransportEventSender};
//!
//! #[derive(Debug)]
//! struct MyTransport;
//!
//! impl Transport for MyTransport {
//!     fn issue(&self, request: StreamRequest, events: TransportEventSender) -> ExchangeHandle {
//!         let task = tokio::spawn(async move { /* drive the exchange */ });
//!         ExchangeHandle::with_abort(0, task.abort_handle())
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

mod config;
mod error;
mod events;
mod metrics;
mod traits;
mod types;

// Re-export all public items
pub use config::{TimeoutConfig, TlsConfig, TlsVersion, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use events::{TransportEvent, TransportEventSender, transport_channel};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use traits::Transport;
pub use types::{
    ACCEPT_EVENT_STREAM, CACHE_CONTROL_NO_CACHE, ExchangeHandle, LAST_EVENT_ID, StreamRequest,
};
