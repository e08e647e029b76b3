//! Event source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EventSourceError, EventSourceResult};

/// How long to wait before reissuing the request after an eligible completion.
///
/// The default reconnects immediately. The other strategies only add a delay;
/// they never change whether a reconnect happens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReconnectDelay {
    /// Reissue as soon as the previous exchange completes.
    #[default]
    Immediate,
    /// Wait a fixed interval.
    Fixed {
        /// Time to wait before every reconnect.
        interval: Duration,
    },
    /// Wait for the last server-sent `retry` value, capped at `max`.
    ///
    /// Reconnects immediately until the server sends a `retry` field.
    ServerSuggested {
        /// Upper bound on the honoured delay.
        max: Duration,
    },
}

impl ReconnectDelay {
    /// Computes the delay given the last `retry` value (milliseconds) seen on the stream.
    pub fn delay(&self, retry_hint: Option<u64>) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Fixed { interval } => *interval,
            Self::ServerSuggested { max } => retry_hint
                .map(Duration::from_millis)
                .map_or(Duration::ZERO, |hint| hint.min(*max)),
        }
    }
}

/// Configuration for an [`EventSource`](crate::EventSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceConfig {
    /// Payload marker that ends the session; a `data` payload containing it
    /// completes the stream and disables reconnection.
    pub done_token: Option<Vec<u8>>,

    /// Resumption id to send on the first request.
    pub last_event_id: Option<String>,

    /// Delay strategy between an eligible completion and the reissued request.
    #[serde(default)]
    pub reconnect_delay: ReconnectDelay,

    /// Capacity of the channel between the session and the subscriber.
    pub event_channel_capacity: usize,

    /// Capacity of the channel the transport reports callbacks into.
    pub transport_channel_capacity: usize,
}

impl Default for EventSourceConfig {
    fn default() -> Self {
        Self {
            done_token: None,
            last_event_id: None,
            reconnect_delay: ReconnectDelay::default(),
            event_channel_capacity: 1000,
            transport_channel_capacity: 64,
        }
    }
}

impl EventSourceConfig {
    /// Sets the done token.
    #[must_use]
    pub fn with_done_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.done_token = Some(token.into());
        self
    }

    /// Sets the initial resumption id.
    #[must_use]
    pub fn with_last_event_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = Some(id.into());
        self
    }

    /// Sets the reconnect delay strategy.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: ReconnectDelay) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Checks the configuration for values that cannot work.
    pub fn validate(&self) -> EventSourceResult<()> {
        if self.done_token.as_ref().is_some_and(Vec::is_empty) {
            return Err(EventSourceError::InvalidConfig(
                "done_token must not be empty".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(EventSourceError::InvalidConfig(
                "event_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.transport_channel_capacity == 0 {
            return Err(EventSourceError::InvalidConfig(
                "transport_channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reconnects_immediately() {
        let config = EventSourceConfig::default();
        assert_eq!(config.reconnect_delay, ReconnectDelay::Immediate);
        assert_eq!(config.reconnect_delay.delay(Some(5000)), Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fixed_delay_ignores_hint() {
        let delay = ReconnectDelay::Fixed {
            interval: Duration::from_millis(250),
        };
        assert_eq!(delay.delay(None), Duration::from_millis(250));
        assert_eq!(delay.delay(Some(10)), Duration::from_millis(250));
    }

    #[test]
    fn test_server_suggested_delay_is_capped() {
        let delay = ReconnectDelay::ServerSuggested {
            max: Duration::from_secs(2),
        };
        assert_eq!(delay.delay(None), Duration::ZERO);
        assert_eq!(delay.delay(Some(500)), Duration::from_millis(500));
        assert_eq!(delay.delay(Some(60_000)), Duration::from_secs(2));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            EventSourceConfig::default().with_done_token("").validate(),
            Err(EventSourceError::InvalidConfig(_))
        ));

        let config = EventSourceConfig {
            event_channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EventSourceConfig {
            transport_channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_delay_serde_shape() {
        let json = serde_json::to_value(ReconnectDelay::Fixed {
            interval: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(json["strategy"], "fixed");

        let parsed: ReconnectDelay =
            serde_json::from_value(serde_json::json!({ "strategy": "immediate" })).unwrap();
        assert_eq!(parsed, ReconnectDelay::Immediate);
    }
}
