//! The event source actor.
//!
//! [`EventSource::connect`] spawns one task that owns the [`Session`] and the
//! receiving end of the transport callback channel. Transport callbacks,
//! control commands and reconnect timers are all handled inside that task, one
//! at a time, so the session is never touched concurrently.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use turbosse::{EventSource, EventSourceConfig, StreamRequest};
//! use turbosse_http::HttpTransport;
//!
//! let transport = Arc::new(HttpTransport::new(Default::default())?);
//! let request = StreamRequest::parse("https://example.com/events")?;
//! let source = EventSource::connect(request, transport, EventSourceConfig::default())?;
//! let (handle, mut events) = source.split();
//!
//! while let Some(event) = events.next().await {
//!     println!("{}", event?);
//! }
//! handle.disconnect()?;
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use turbosse_transport_traits::{
    ExchangeHandle, StreamRequest, Transport, TransportError, TransportEvent,
    TransportEventSender, transport_channel,
};

use crate::config::{EventSourceConfig, ReconnectDelay};
use crate::error::{EventSourceError, EventSourceResult};
use crate::event::Event;
use crate::session::{Action, ConnectionPhase, Session, SessionSnapshot};

/// Control commands sent from an [`EventSourceHandle`] to the actor.
#[derive(Debug)]
enum Command {
    Disconnect,
}

/// What the actor delivers to the subscriber.
#[derive(Debug)]
enum Signal {
    Event(Event),
    Finished,
    Failed(TransportError),
}

/// A running event stream.
///
/// Implements [`Stream`] directly, or can be [`split`](EventSource::split) into
/// a control handle and the event stream.
#[derive(Debug)]
pub struct EventSource {
    handle: EventSourceHandle,
    stream: EventStream,
}

impl EventSource {
    /// Starts streaming `request` over `transport`.
    ///
    /// Returns immediately; the first request is issued from the spawned actor
    /// and everything that follows is reported through the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or no Tokio runtime is running.
    pub fn connect(
        request: StreamRequest,
        transport: Arc<dyn Transport>,
        config: EventSourceConfig,
    ) -> EventSourceResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EventSourceError::Runtime(e.to_string()))?;

        let (session, initial) =
            Session::new(request, config.done_token, config.last_event_id);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (signals_tx, signals_rx) = mpsc::channel(config.event_channel_capacity);
        let (events, transport_rx) = transport_channel(config.transport_channel_capacity);
        let (state_tx, state_rx) = watch::channel(session.snapshot());

        info!(request = %initial, "Connecting event stream");
        let driver = Driver {
            session,
            transport,
            reconnect_delay: config.reconnect_delay,
            events,
            exchange: None,
            pending: None,
            signals: signals_tx,
            state: state_tx,
        };
        runtime.spawn(driver.run(initial, commands_rx, transport_rx));

        Ok(Self {
            handle: EventSourceHandle {
                commands: commands_tx,
                state: state_rx,
            },
            stream: EventStream {
                signals: signals_rx,
                terminated: false,
            },
        })
    }

    /// Starts streaming `request` over a default HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, or for the same
    /// reasons as [`connect`](Self::connect).
    #[cfg(feature = "http")]
    pub fn connect_http(
        request: StreamRequest,
        config: EventSourceConfig,
    ) -> EventSourceResult<Self> {
        let transport = turbosse_http::HttpTransport::new(Default::default())?;
        Self::connect(request, Arc::new(transport), config)
    }

    /// Splits into a control handle and the event stream.
    pub fn split(self) -> (EventSourceHandle, EventStream) {
        (self.handle, self.stream)
    }

    /// The control handle.
    pub const fn handle(&self) -> &EventSourceHandle {
        &self.handle
    }
}

impl Stream for EventSource {
    type Item = EventSourceResult<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

/// Clone-able handle for controlling and observing a running [`EventSource`].
#[derive(Debug, Clone)]
pub struct EventSourceHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionSnapshot>,
}

impl EventSourceHandle {
    /// Closes the stream and cancels the in-flight exchange.
    ///
    /// Does not wait for the actor; the event stream ends once it has stopped.
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError::Closed`] if the actor has already stopped.
    pub fn disconnect(&self) -> EventSourceResult<()> {
        self.commands
            .send(Command::Disconnect)
            .map_err(|_| EventSourceError::Closed)
    }

    /// Current connection phase.
    pub fn state(&self) -> ConnectionPhase {
        self.state.borrow().phase
    }

    /// Resumption id that the next request will carry.
    pub fn last_event_id(&self) -> Option<String> {
        self.state.borrow().last_event_id.clone()
    }

    /// Whether the done token has been seen.
    pub fn is_done(&self) -> bool {
        self.state.borrow().done
    }

    /// A copy of the full observable session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Waits until the session reaches `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError::Closed`] if the actor stops first.
    pub async fn wait_for_phase(&self, phase: ConnectionPhase) -> EventSourceResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|snapshot| snapshot.phase == phase)
            .await
            .map(|_| ())
            .map_err(|_| EventSourceError::Closed)
    }

    /// Returns `true` while the actor is running.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Ordered events of an [`EventSource`].
///
/// Yields every event in arrival order. A transport failure is yielded once as
/// an `Err`; normal completion ends the stream. Nothing is yielded after either.
/// Dropping the stream stops the event source.
#[derive(Debug)]
pub struct EventStream {
    signals: mpsc::Receiver<Signal>,
    terminated: bool,
}

impl EventStream {
    /// Receives the next event, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<EventSourceResult<Event>> {
        self.next().await
    }
}

impl Stream for EventStream {
    type Item = EventSourceResult<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }
        match this.signals.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Signal::Event(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Signal::Failed(error))) => {
                this.terminated = true;
                Poll::Ready(Some(Err(error.into())))
            }
            Poll::Ready(Some(Signal::Finished) | None) => {
                this.terminated = true;
                Poll::Ready(None)
            }
        }
    }
}

/// A reconnect waiting out its delay.
#[derive(Debug)]
struct PendingReconnect {
    at: Instant,
    request: StreamRequest,
}

/// The actor task state.
struct Driver {
    session: Session,
    transport: Arc<dyn Transport>,
    reconnect_delay: ReconnectDelay,
    events: TransportEventSender,
    exchange: Option<ExchangeHandle>,
    pending: Option<PendingReconnect>,
    signals: mpsc::Sender<Signal>,
    state: watch::Sender<SessionSnapshot>,
}

impl Driver {
    async fn run(
        mut self,
        initial: StreamRequest,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
    ) {
        self.issue(initial);
        let mut commands_open = true;
        let mut close = true;

        loop {
            let deadline = self.pending.as_ref().map(|pending| pending.at);

            tokio::select! {
                biased;

                command = commands.recv(), if commands_open => match command {
                    Some(Command::Disconnect) => {
                        info!("Disconnect requested");
                        break;
                    }
                    // Every handle is gone; keep streaming for the subscriber.
                    None => commands_open = false,
                },

                () = self.signals.closed() => {
                    debug!("Subscriber dropped the event stream");
                    break;
                }

                event = transport_rx.recv() => {
                    let Some(event) = event else { break };
                    if !self.on_transport_event(event).await {
                        break;
                    }
                    self.publish();
                    if self.is_idle() {
                        debug!(phase = %self.session.phase(), "Event stream ended, stopping");
                        close = false;
                        break;
                    }
                }

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    if let Some(pending) = self.pending.take() {
                        self.issue(pending.request);
                    }
                }
            }
        }

        if close {
            self.shutdown();
        }
    }

    /// Applies one transport callback. Returns `false` once the subscriber is gone.
    async fn on_transport_event(&mut self, event: TransportEvent) -> bool {
        trace!(kind = event.kind(), phase = %self.session.phase(), "Transport event");
        match event {
            TransportEvent::Response { status } => {
                self.session.on_response(status);
                true
            }
            TransportEvent::Chunk(chunk) => {
                let actions = self.session.on_chunk(&chunk);
                self.apply(actions).await
            }
            TransportEvent::Redirect {
                status,
                target,
                reply,
            } => {
                let follow = self.session.on_redirect(target);
                debug!(status, follow = follow.is_some(), "Redirect proposed");
                // The exchange may already be cancelled.
                let _ = reply.send(follow);
                true
            }
            TransportEvent::Completed { status, error } => {
                self.exchange = None;
                if let Some(error) = &error {
                    warn!(status, error = %error, "Exchange failed");
                }
                let actions = self.session.on_completed(status, error);
                self.apply(actions).await
            }
        }
    }

    async fn apply(&mut self, actions: Vec<Action>) -> bool {
        for action in actions {
            let signal = match action {
                Action::Emit(event) => Signal::Event(event),
                Action::Finish => {
                    info!(done = self.session.is_done(), "Event stream finished");
                    Signal::Finished
                }
                Action::Fail(error) => Signal::Failed(error),
                Action::Reconnect(request) => {
                    self.schedule(request);
                    continue;
                }
            };
            if self.signals.send(signal).await.is_err() {
                return false;
            }
        }
        true
    }

    /// Terminal signal delivered and nothing left in flight.
    fn is_idle(&self) -> bool {
        self.session.is_terminated() && self.exchange.is_none() && self.pending.is_none()
    }

    fn schedule(&mut self, request: StreamRequest) {
        let delay = self.reconnect_delay.delay(self.session.retry_hint());
        if delay.is_zero() {
            self.issue(request);
        } else {
            debug!(delay_ms = delay.as_millis() as u64, "Delaying reconnect");
            self.pending = Some(PendingReconnect {
                at: Instant::now() + delay,
                request,
            });
        }
    }

    fn issue(&mut self, request: StreamRequest) {
        debug!(request = %request, "Issuing request");
        let handle = self.transport.issue(request, self.events.clone());
        self.exchange = Some(handle);
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn shutdown(&mut self) {
        self.session.disconnect();
        self.pending = None;
        if let Some(exchange) = self.exchange.take() {
            debug!(exchange = exchange.id(), "Cancelling exchange");
            self.transport.cancel(exchange);
        }
        self.publish();
        info!("Event stream closed");
    }
}
