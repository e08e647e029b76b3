//! Transport callback types.
//!
//! A transport reports the lifecycle of an exchange as a sequence of
//! [`TransportEvent`]s over one ordered channel. The receiving side handles
//! them one at a time, which is what keeps the consumer's session state free of
//! explicit locking.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::types::StreamRequest;

/// Callbacks delivered by a transport for a single exchange.
#[derive(Debug)]
pub enum TransportEvent {
    /// Response headers and status arrived for the final (non-redirect) response.
    Response {
        /// The HTTP status code.
        status: u16,
    },

    /// A chunk of the response body, in arrival order.
    Chunk(Bytes),

    /// The server proposed a redirect.
    ///
    /// The consumer answers on `reply` with the request the transport should
    /// follow, or `None` to stop following it.
    Redirect {
        /// The redirect status code (301, 302, 303, 307 or 308).
        status: u16,
        /// The request the transport would issue for the redirect target.
        target: StreamRequest,
        /// Where the consumer sends back the request to follow.
        reply: oneshot::Sender<Option<StreamRequest>>,
    },

    /// The exchange finished. Always the last event of an exchange.
    Completed {
        /// The status code of the last response received, if any.
        status: Option<u16>,
        /// The error that ended the exchange, if it did not end cleanly.
        error: Option<TransportError>,
    },
}

impl TransportEvent {
    /// Returns a short name for the event kind, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Response { .. } => "response",
            Self::Chunk(_) => "chunk",
            Self::Redirect { .. } => "redirect",
            Self::Completed { .. } => "completed",
        }
    }
}

/// Creates the ordered channel a transport reports into.
pub fn transport_channel(
    capacity: usize,
) -> (TransportEventSender, mpsc::Receiver<TransportEvent>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (TransportEventSender { sender }, receiver)
}

/// The sending half handed to [`Transport::issue`](crate::Transport::issue).
///
/// All methods return `false` once the consumer is gone; transports should
/// stop work on the exchange when that happens.
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    sender: mpsc::Sender<TransportEvent>,
}

impl TransportEventSender {
    /// Delivers an event, waiting for channel capacity.
    pub async fn send(&self, event: TransportEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    /// Reports that response headers arrived.
    pub async fn response(&self, status: u16) -> bool {
        self.send(TransportEvent::Response { status }).await
    }

    /// Reports a body chunk.
    pub async fn chunk(&self, chunk: Bytes) -> bool {
        self.send(TransportEvent::Chunk(chunk)).await
    }

    /// Proposes a redirect and waits for the consumer's decision.
    ///
    /// Returns `None` when the consumer refuses the redirect or has gone away.
    pub async fn redirect(&self, status: u16, target: StreamRequest) -> Option<StreamRequest> {
        let (reply, decision) = oneshot::channel();
        if !self
            .send(TransportEvent::Redirect {
                status,
                target,
                reply,
            })
            .await
        {
            return None;
        }
        decision.await.ok().flatten()
    }

    /// Reports the end of the exchange.
    pub async fn completed(&self, status: Option<u16>, error: Option<TransportError>) -> bool {
        self.send(TransportEvent::Completed { status, error }).await
    }

    /// Returns `true` once the consumer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
