//! Connection state machine.
//!
//! [`Session`] holds everything one logical event stream needs to survive
//! reconnects: the phase, the resumption id, the done flag and the last request
//! issued. It performs no I/O. The caller feeds it transport callbacks and
//! carries out the [`Action`]s it returns, one callback at a time; nothing in
//! here is synchronized, so two callbacks must never be applied concurrently.
//!
//! ```text
//!            response            eligible completion
//! Connecting ────────► Open ─────────────────────────► Connecting ─► ...
//!      │                 │
//!      └──── disconnect ─┴──────────────► Closed (terminal)
//! ```

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use turbosse_transport_traits::{StreamRequest, TransportError};

use crate::event::{Event, contains_subsequence};

/// Status codes that allow a reconnect when no done token is configured.
///
/// A plain `200` that ends without a token is treated as a finished stream.
const RECONNECT_STATUS: Range<u16> = 201..300;

/// Status codes that allow a reconnect when a done token is configured.
const RECONNECT_STATUS_WITH_TOKEN: Range<u16> = 200..300;

/// The connection phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// A request has been issued and no response has arrived yet.
    Connecting,
    /// Response headers arrived; body chunks are being parsed.
    Open,
    /// Disconnected by the caller. Terminal.
    Closed,
}

impl ConnectionPhase {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Connecting)
                | (Self::Open, Self::Connecting)
                | (Self::Connecting | Self::Open, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Work the owner of a [`Session`] must carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Deliver an event to the subscriber.
    Emit(Event),
    /// Signal normal completion to the subscriber.
    Finish,
    /// Signal failure to the subscriber.
    Fail(TransportError),
    /// Issue this request to the transport.
    Reconnect(StreamRequest),
}

/// A point-in-time copy of the observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: ConnectionPhase,
    /// Resumption id that the next request will carry.
    pub last_event_id: Option<String>,
    /// Whether the done token has been seen.
    pub done: bool,
    /// Whether the subscriber has received its terminal signal.
    pub terminated: bool,
}

/// State machine for one logical event stream.
#[derive(Debug)]
pub struct Session {
    phase: ConnectionPhase,
    last_event_id: Option<String>,
    done: bool,
    terminated: bool,
    retry_hint: Option<u64>,
    last_request: StreamRequest,
    done_token: Option<Vec<u8>>,
}

impl Session {
    /// Creates a session and the first request to issue.
    ///
    /// The returned request carries the streaming headers and, when
    /// `last_event_id` is given, the resumption header.
    pub fn new(
        request: StreamRequest,
        done_token: Option<Vec<u8>>,
        last_event_id: Option<String>,
    ) -> (Self, StreamRequest) {
        let initial = request.with_stream_headers(last_event_id.as_deref());
        let session = Self {
            phase: ConnectionPhase::Connecting,
            last_event_id,
            done: false,
            terminated: false,
            retry_hint: None,
            last_request: initial.clone(),
            done_token,
        };
        (session, initial)
    }

    /// Current phase.
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Resumption id that the next request will carry.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Whether the done token has been seen.
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Whether the subscriber has received its terminal signal.
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Last `retry` value received, in milliseconds.
    pub const fn retry_hint(&self) -> Option<u64> {
        self.retry_hint
    }

    /// The most recently issued request.
    pub const fn last_request(&self) -> &StreamRequest {
        &self.last_request
    }

    /// Status codes that permit a reconnect for this session.
    pub fn reconnect_range(&self) -> Range<u16> {
        if self.done_token.is_some() {
            RECONNECT_STATUS_WITH_TOKEN
        } else {
            RECONNECT_STATUS
        }
    }

    /// Returns a copy of the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            last_event_id: self.last_event_id.clone(),
            done: self.done,
            terminated: self.terminated,
        }
    }

    /// Response headers arrived.
    pub fn on_response(&mut self, status: u16) {
        if self.transition(ConnectionPhase::Open) {
            debug!(status, "Event stream open");
        }
    }

    /// A body chunk arrived.
    ///
    /// Chunks are only parsed while the session is open. Every event still
    /// updates session state after the done token is seen, but nothing is
    /// emitted once the subscriber has its terminal signal.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<Action> {
        if self.phase != ConnectionPhase::Open {
            trace!(phase = %self.phase, len = chunk.len(), "Dropping chunk outside open phase");
            return Vec::new();
        }

        let events = Event::parse(chunk);
        if events.is_empty() {
            return Vec::new();
        }
        debug!(count = events.len(), len = chunk.len(), "Parsed chunk");

        let mut actions = Vec::with_capacity(events.len());
        for event in events {
            match &event {
                Event::Id(id) => self.last_event_id.clone_from(id),
                Event::Retry(ms) => self.retry_hint = Some(*ms),
                _ => {}
            }

            let finished = match (&event, &self.done_token) {
                (Event::Data(payload), Some(token)) => contains_subsequence(payload, token),
                _ => false,
            };

            self.emit(&mut actions, Action::Emit(event));
            if finished && !self.done {
                info!("Done token received, stream finished");
                self.emit(&mut actions, Action::Finish);
                self.done = true;
            }
        }
        actions
    }

    /// The transport proposed a redirect to `target`.
    ///
    /// Returns the request to follow: the target carrying every header of the
    /// last issued request plus the streaming headers. Refuses once closed.
    pub fn on_redirect(&mut self, target: StreamRequest) -> Option<StreamRequest> {
        if self.phase == ConnectionPhase::Closed {
            return None;
        }
        let request = target
            .merge_headers_from(&self.last_request)
            .with_stream_headers(self.last_event_id.as_deref());
        debug!(url = %request.url, "Following redirect");
        self.last_request = request.clone();
        Some(request)
    }

    /// The exchange completed with the given final status and optional error.
    pub fn on_completed(
        &mut self,
        status: Option<u16>,
        error: Option<TransportError>,
    ) -> Vec<Action> {
        if self.phase == ConnectionPhase::Closed {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let Some(error) = error {
            self.emit(&mut actions, Action::Fail(error));
        }

        if self.should_reconnect(status) {
            self.transition(ConnectionPhase::Connecting);
            let request = self
                .last_request
                .clone()
                .with_stream_headers(self.last_event_id.as_deref());
            self.last_request = request.clone();
            info!(
                status,
                last_event_id = self.last_event_id.as_deref(),
                "Reconnecting event stream"
            );
            actions.push(Action::Reconnect(request));
        } else {
            debug!(status, done = self.done, "Event stream completed");
            self.emit(&mut actions, Action::Finish);
        }
        actions
    }

    /// The caller disconnected. No further callbacks are acted upon.
    pub fn disconnect(&mut self) {
        self.transition(ConnectionPhase::Closed);
    }

    /// Reconnect iff there is a request to reissue, the status is eligible and
    /// the done token has not been seen.
    fn should_reconnect(&self, status: Option<u16>) -> bool {
        !self.done && status.is_some_and(|code| self.reconnect_range().contains(&code))
    }

    fn transition(&mut self, next: ConnectionPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            trace!(from = %self.phase, to = %next, "Ignoring phase transition");
            return false;
        }
        self.phase = next;
        true
    }

    /// Queues a subscriber-facing action unless the subscriber is already terminated.
    fn emit(&mut self, actions: &mut Vec<Action>, action: Action) {
        if self.terminated {
            return;
        }
        if matches!(action, Action::Finish | Action::Fail(_)) {
            self.terminated = true;
        }
        actions.push(action);
    }
}
