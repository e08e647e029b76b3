//! # TurboSSE HTTP Transport
//!
//! Default [`Transport`] for TurboSSE: issues streaming HTTP requests with
//! reqwest and reports headers, body chunks, redirects and completion through
//! the transport callback channel.
//!
//! ## Features
//!
//! - **Long-lived exchanges**: no overall request timeout, only a connect
//!   timeout unless configured otherwise
//! - **Surfaced redirects**: `Location` targets are proposed to the consumer,
//!   which decides which headers the followed request carries
//! - **Redirect limit**: exchanges that redirect too often fail with
//!   [`TransportError::TooManyRedirects`]
//! - **TLS**: minimum protocol version, custom CA certificates, and an
//!   environment-gated switch to disable certificate validation
//! - **Metrics**: exchange, redirect and byte counters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use turbosse_http::{HttpTransport, TimeoutConfig, TransportConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig::default()
//!     .with_timeouts(TimeoutConfig::heartbeat(Duration::from_secs(60)))
//!     .with_default_header("Authorization", "Bearer token");
//!
//! let transport = HttpTransport::new(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - Certificate validation is enabled by default
//! - Disabling it requires `TURBOSSE_ALLOW_INSECURE_TLS` to be set

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod transport;

// Re-export the transport implementation
pub use transport::HttpTransport;

// Re-export common types from traits crate for convenience
pub use turbosse_transport_traits::{
    TimeoutConfig, TlsConfig, TlsVersion, Transport, TransportConfig, TransportError,
    TransportMetrics, TransportResult,
};
