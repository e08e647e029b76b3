//! Transport error types.

use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur while running a streaming exchange.
///
/// These are surfaced verbatim to the event source's subscriber; the event
/// source never retries on the error kind, only on the exchange's final
/// status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost while streaming the body.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The operation did not complete within the specified timeout.
    #[error("Operation timed out")]
    Timeout,

    /// Connection establishment timed out.
    #[error(
        "Connection timed out after {timeout:?} for {url}. \
         If this is expected, increase the timeout with \
         `TimeoutConfig {{ connect: Duration::from_secs({}) }}`",
        timeout.as_secs() * 2
    )]
    ConnectionTimeout {
        /// The URL that could not be reached
        url: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The server redirected more times than the transport allows.
    #[error(
        "Too many redirects (limit {max}). \
         If this is expected, raise `max_redirects` on the transport configuration"
    )]
    TooManyRedirects {
        /// The configured redirect limit
        max: usize,
    },

    /// A redirect response carried no usable `Location`.
    #[error("Invalid redirect: {0}")]
    InvalidRedirect(String),

    /// The request could not be turned into a wire request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Returns `true` for errors raised before any response was received.
    pub const fn is_connect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ConnectionTimeout { .. } | Self::Timeout
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<http::Error> for TransportError {
    fn from(err: http::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
