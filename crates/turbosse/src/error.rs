//! Event source error types.

use thiserror::Error;
use turbosse_transport_traits::TransportError;

/// A specialized `Result` type for event source operations.
pub type EventSourceResult<T> = std::result::Result<T, EventSourceError>;

/// Errors surfaced by an [`EventSource`](crate::EventSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventSourceError {
    /// The transport reported an error; delivered to the subscriber as the failure signal.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The event source has stopped and no longer accepts commands.
    #[error("Event source is closed")]
    Closed,

    /// The configuration was rejected before connecting.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No Tokio runtime was available to run the session on.
    #[error("No Tokio runtime available: {0}")]
    Runtime(String),
}

impl EventSourceError {
    /// Returns the transport error behind a failure signal, if any.
    pub const fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}
