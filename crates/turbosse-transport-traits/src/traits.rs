//! Core transport trait.

use crate::events::TransportEventSender;
use crate::metrics::TransportMetrics;
use crate::types::{ExchangeHandle, StreamRequest};

/// A collaborator able to run streaming HTTP exchanges.
///
/// `issue` must return without waiting for the exchange: everything the
/// exchange produces (headers, body chunks, redirect proposals, completion) is
/// reported through `events`, and exactly one
/// [`TransportEvent::Completed`](crate::TransportEvent::Completed) ends it
/// unless the exchange is cancelled first.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Starts a streaming exchange for `request`.
    fn issue(&self, request: StreamRequest, events: TransportEventSender) -> ExchangeHandle;

    /// Aborts an in-flight exchange immediately.
    ///
    /// No further events are guaranteed after this returns, though one already
    /// queued may still be observed.
    fn cancel(&self, handle: ExchangeHandle) {
        handle.abort();
    }

    /// Cancels every exchange this transport owns and refuses new work.
    fn invalidate(&self) {}

    /// Returns a snapshot of the transport's counters.
    fn metrics(&self) -> TransportMetrics {
        TransportMetrics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The event source holds transports as trait objects.
    fn _test_transport_object(_t: &dyn Transport) {}

    #[derive(Debug)]
    struct NoopTransport;

    impl Transport for NoopTransport {
        fn issue(&self, _request: StreamRequest, _events: TransportEventSender) -> ExchangeHandle {
            ExchangeHandle::new(1)
        }
    }

    #[test]
    fn test_default_methods() {
        let transport = NoopTransport;
        let (events, _receiver) = crate::events::transport_channel(1);
        let request = StreamRequest::parse("http://localhost/").unwrap();

        let handle = transport.issue(request, events);
        assert_eq!(handle.id(), 1);
        transport.cancel(handle);
        transport.invalidate();
        assert_eq!(transport.metrics().exchanges, 0);
    }
}
