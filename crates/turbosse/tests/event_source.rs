//! Event source behavior against a scripted transport.
//!
//! The transport records every issued request and hands the test the sending
//! side of the callback channel, so each test plays the server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use turbosse::{
    ConnectionPhase, Event, EventSource, EventSourceConfig, EventSourceError, ExchangeHandle,
    ReconnectDelay, StreamRequest, Transport, TransportError, TransportEventSender,
};

/// One exchange issued by the event source.
#[derive(Debug)]
struct Issued {
    id: u64,
    request: StreamRequest,
    events: TransportEventSender,
}

#[derive(Debug)]
struct ScriptedTransport {
    issued: mpsc::UnboundedSender<Issued>,
    cancelled: Arc<Mutex<Vec<u64>>>,
    next_id: Mutex<u64>,
}

impl Transport for ScriptedTransport {
    fn issue(&self, request: StreamRequest, events: TransportEventSender) -> ExchangeHandle {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = *next_id;
        self.issued.send(Issued { id, request, events }).unwrap();
        ExchangeHandle::new(id)
    }

    fn cancel(&self, handle: ExchangeHandle) {
        self.cancelled.lock().unwrap().push(handle.id());
    }
}

struct Harness {
    issued: mpsc::UnboundedReceiver<Issued>,
    cancelled: Arc<Mutex<Vec<u64>>>,
    transport: Arc<ScriptedTransport>,
}

impl Harness {
    fn new() -> Self {
        let (tx, issued) = mpsc::unbounded_channel();
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport {
            issued: tx,
            cancelled: Arc::clone(&cancelled),
            next_id: Mutex::new(0),
        });
        Self {
            issued,
            cancelled,
            transport,
        }
    }

    fn connect(&self, config: EventSourceConfig) -> EventSource {
        let request = StreamRequest::parse("http://localhost/events")
            .unwrap()
            .header("Authorization", "Bearer secret")
            .unwrap();
        EventSource::connect(request, self.transport.clone(), config).unwrap()
    }

    async fn next_exchange(&mut self) -> Issued {
        tokio::time::timeout(Duration::from_secs(60), self.issued.recv())
            .await
            .expect("no request issued")
            .expect("transport dropped")
    }

    async fn assert_no_exchange(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.issued.recv()).await;
        assert!(next.is_err(), "unexpected request issued");
    }
}

fn data(payload: &'static str) -> Event {
    Event::Data(Bytes::from_static(payload.as_bytes()))
}

async fn next_event(source: &mut EventSource) -> Option<Result<Event, EventSourceError>> {
    tokio::time::timeout(Duration::from_secs(5), source.next())
        .await
        .expect("stream stalled")
}

#[tokio::test]
async fn test_first_request_carries_stream_headers() {
    let mut harness = Harness::new();
    let config = EventSourceConfig::default().with_last_event_id("3");
    let _source = harness.connect(config);

    let exchange = harness.next_exchange().await;
    let headers = &exchange.request.headers;
    assert_eq!(headers["accept"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["authorization"], "Bearer secret");
    assert_eq!(exchange.request.last_event_id(), Some("3"));
}

#[tokio::test]
async fn test_events_delivered_in_order_then_finished() {
    let mut harness = Harness::new();
    let mut source = harness.connect(EventSourceConfig::default());
    let exchange = harness.next_exchange().await;

    exchange.events.response(200).await;
    exchange
        .events
        .chunk(Bytes::from_static(b"id: 1\nevent: greeting\ndata: hi\n\n"))
        .await;
    exchange.events.chunk(Bytes::from_static(b"data: there\n")).await;
    exchange.events.completed(Some(500), None).await;

    let mut received = Vec::new();
    while let Some(event) = next_event(&mut source).await {
        received.push(event.unwrap());
    }
    assert_eq!(
        received,
        vec![
            Event::Id(Some("1".into())),
            Event::EventType("greeting".into()),
            data("hi"),
            data("there"),
        ]
    );
    harness.assert_no_exchange().await;
}

#[tokio::test]
async fn test_reconnect_resumes_from_last_event_id() {
    let mut harness = Harness::new();
    let mut source = harness.connect(EventSourceConfig::default());
    let first = harness.next_exchange().await;

    first.events.response(200).await;
    first.events.chunk(Bytes::from_static(b"id: 7\ndata: a\n")).await;
    first.events.completed(Some(204), None).await;

    let second = harness.next_exchange().await;
    assert_eq!(second.request.last_event_id(), Some("7"));
    assert_eq!(second.request.headers["authorization"], "Bearer secret");
    assert_eq!(source.handle().last_event_id().as_deref(), Some("7"));

    // Events keep flowing on the same stream across the reconnect.
    second.events.response(200).await;
    second.events.chunk(Bytes::from_static(b"data: b\n")).await;

    assert_eq!(next_event(&mut source).await.unwrap().unwrap(), Event::Id(Some("7".into())));
    assert_eq!(next_event(&mut source).await.unwrap().unwrap(), data("a"));
    assert_eq!(next_event(&mut source).await.unwrap().unwrap(), data("b"));
}

#[tokio::test]
async fn test_plain_200_completion_finishes_without_token() {
    let mut harness = Harness::new();
    let mut source = harness.connect(EventSourceConfig::default());
    let exchange = harness.next_exchange().await;

    exchange.events.response(200).await;
    exchange.events.completed(Some(200), None).await;

    assert!(next_event(&mut source).await.is_none());
    harness.assert_no_exchange().await;
}

#[tokio::test]
async fn test_plain_200_completion_reconnects_with_token() {
    let mut harness = Harness::new();
    let _source = harness.connect(EventSourceConfig::default().with_done_token("[DONE]"));
    let exchange = harness.next_exchange().await;

    exchange.events.response(200).await;
    exchange.events.completed(Some(200), None).await;

    harness.next_exchange().await;
}

#[tokio::test]
async fn test_done_token_ends_stream_and_prevents_reconnect() {
    let mut harness = Harness::new();
    let mut source = harness.connect(EventSourceConfig::default().with_done_token("[DONE]"));
    let exchange = harness.next_exchange().await;

    exchange.events.response(200).await;
    exchange
        .events
        .chunk(Bytes::from_static(b"data: partial\ndata: [DONE]\ndata: late\n"))
        .await;

    assert_eq!(next_event(&mut source).await.unwrap().unwrap(), data("partial"));
    assert_eq!(next_event(&mut source).await.unwrap().unwrap(), data("[DONE]"));
    assert!(next_event(&mut source).await.is_none());
    assert!(source.handle().is_done());

    exchange.events.completed(Some(200), None).await;
    harness.assert_no_exchange().await;
}

#[tokio::test]
async fn test_redirect_copies_headers_and_is_reissued() {
    let mut harness = Harness::new();
    let _source = harness.connect(EventSourceConfig::default());
    let first = harness.next_exchange().await;

    let target = StreamRequest::parse("http://mirror.local/events").unwrap();
    let follow = first.events.redirect(307, target).await.unwrap();
    assert_eq!(follow.url.as_str(), "http://mirror.local/events");
    assert_eq!(follow.headers["authorization"], "Bearer secret");
    assert_eq!(follow.headers["accept"], "text/event-stream");

    first.events.response(201).await;
    first.events.completed(Some(201), None).await;

    let second = harness.next_exchange().await;
    assert_eq!(second.request.url.as_str(), "http://mirror.local/events");
}

#[tokio::test]
async fn test_transport_error_surfaces_once() {
    let mut harness = Harness::new();
    let mut source = harness.connect(EventSourceConfig::default());
    let exchange = harness.next_exchange().await;

    let error = TransportError::ConnectionFailed("connection refused".into());
    exchange.events.completed(None, Some(error.clone())).await;

    let failure = next_event(&mut source).await.unwrap().unwrap_err();
    assert_eq!(failure, EventSourceError::Transport(error));
    assert!(next_event(&mut source).await.is_none());
}

#[tokio::test]
async fn test_disconnect_cancels_and_closes() {
    let mut harness = Harness::new();
    let source = harness.connect(EventSourceConfig::default());
    let (handle, mut events) = source.split();
    let exchange = harness.next_exchange().await;

    exchange.events.response(200).await;
    handle.wait_for_phase(ConnectionPhase::Open).await.unwrap();

    handle.disconnect().unwrap();
    assert!(events.next_event().await.is_none());
    assert_eq!(handle.state(), ConnectionPhase::Closed);
    assert_eq!(*harness.cancelled.lock().unwrap(), vec![exchange.id]);

    // Late callbacks race the disconnect and are ignored.
    assert!(!exchange.events.chunk(Bytes::from_static(b"data: x\n")).await);
    assert_eq!(handle.disconnect(), Err(EventSourceError::Closed));
    assert!(!handle.is_running());
}

#[tokio::test]
async fn test_normal_completion_keeps_phase() {
    let mut harness = Harness::new();
    let source = harness.connect(EventSourceConfig::default());
    let (handle, mut events) = source.split();
    let exchange = harness.next_exchange().await;

    exchange.events.response(200).await;
    exchange.events.completed(Some(500), None).await;
    assert!(events.next_event().await.is_none());

    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.is_running() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(handle.state(), ConnectionPhase::Open);
    assert!(harness.cancelled.lock().unwrap().is_empty());
    assert_eq!(handle.disconnect(), Err(EventSourceError::Closed));
}

#[tokio::test]
async fn test_dropping_stream_stops_event_source() {
    let mut harness = Harness::new();
    let source = harness.connect(EventSourceConfig::default());
    let (handle, events) = source.split();
    let exchange = harness.next_exchange().await;

    drop(events);
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.is_running() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(*harness.cancelled.lock().unwrap(), vec![exchange.id]);
    assert_eq!(handle.state(), ConnectionPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_server_suggested_reconnect_delay() {
    let mut harness = Harness::new();
    let config = EventSourceConfig::default().with_reconnect_delay(ReconnectDelay::ServerSuggested {
        max: Duration::from_secs(30),
    });
    let _source = harness.connect(config);
    let first = harness.next_exchange().await;

    first.events.response(200).await;
    first.events.chunk(Bytes::from_static(b"retry: 5000\n")).await;
    let completed_at = tokio::time::Instant::now();
    first.events.completed(Some(204), None).await;

    harness.next_exchange().await;
    assert!(completed_at.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let harness = Harness::new();
    let request = StreamRequest::parse("http://localhost/events").unwrap();
    let result = EventSource::connect(
        request,
        harness.transport.clone(),
        EventSourceConfig::default().with_done_token(""),
    );
    assert!(matches!(result, Err(EventSourceError::InvalidConfig(_))));
}

#[test]
fn test_connect_requires_runtime() {
    let harness = Harness::new();
    let request = StreamRequest::parse("http://localhost/events").unwrap();
    let result = EventSource::connect(request, harness.transport.clone(), Default::default());
    assert!(matches!(result, Err(EventSourceError::Runtime(_))));
}
