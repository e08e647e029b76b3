//! CLI error types.

use thiserror::Error;
use turbosse::{EventSourceError, TransportError};

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI run.
#[derive(Error, Debug)]
pub enum CliError {
    /// A `--header` argument was not `name:value`.
    #[error("Invalid header {0:?}: expected NAME:VALUE")]
    InvalidHeader(String),

    /// The URL or a header could not be turned into a request, or the
    /// transport could not be built.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The event stream failed.
    #[error("Stream failed: {0}")]
    Stream(#[from] EventSourceError),

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing to stdout failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Suggestions shown under the error message.
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidHeader(_) => vec!["Pass headers as -H 'Authorization: Bearer TOKEN'"],
            Self::Stream(err) if err.as_transport().is_some_and(TransportError::is_connect) => {
                vec![
                    "Check that the server is running",
                    "Verify the URL and port",
                ]
            }
            Self::Stream(err)
                if matches!(
                    err.as_transport(),
                    Some(TransportError::TooManyRedirects { .. })
                ) =>
            {
                vec!["Raise the limit with --max-redirects"]
            }
            _ => vec![],
        }
    }
}
