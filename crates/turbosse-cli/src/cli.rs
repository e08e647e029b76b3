//! CLI argument parsing.

use std::time::Duration;

use clap::Parser;
use tracing::Level;
use turbosse::{
    EventSourceConfig, ReconnectDelay, StreamRequest, TimeoutConfig, TransportConfig,
};

use crate::error::{CliError, CliResult};

/// Tail a Server-Sent Events stream.
#[derive(Parser, Debug)]
#[command(
    name = "turbosse",
    version,
    about = "Tail a Server-Sent Events stream",
    long_about = "Connects to an SSE endpoint and prints every field line as it arrives.\n\
                  Reconnects on 2xx completions, resuming with Last-Event-Id, until the\n\
                  server ends the stream, the done token is seen, or Ctrl-C is pressed."
)]
pub struct Cli {
    /// Stream URL
    pub url: String,

    /// Extra request header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Resume from this event id
    #[arg(long, env = "TURBOSSE_LAST_EVENT_ID")]
    pub last_event_id: Option<String>,

    /// Payload marker that ends the stream
    #[arg(long)]
    pub done_token: Option<String>,

    /// Print one JSON object per line
    #[arg(long)]
    pub json: bool,

    /// Wait this long before each reconnect
    #[arg(long, value_name = "MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Maximum redirects followed per request
    #[arg(long, default_value_t = 10)]
    pub max_redirects: usize,

    /// Treat the stream as dead after this many seconds of silence
    #[arg(long, value_name = "SECS")]
    pub read_timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Log level selected by `-v` / `-q`.
    pub const fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// Builds the initial request from the URL and `-H` arguments.
    pub fn request(&self) -> CliResult<StreamRequest> {
        let mut request = StreamRequest::parse(&self.url)?;
        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| CliError::InvalidHeader(header.clone()))?;
            request = request.header(name.trim(), value.trim())?;
        }
        Ok(request)
    }

    /// Event source settings.
    pub fn event_source_config(&self) -> EventSourceConfig {
        let mut config = EventSourceConfig::default();
        if let Some(token) = &self.done_token {
            config = config.with_done_token(token.as_bytes());
        }
        if let Some(id) = &self.last_event_id {
            config = config.with_last_event_id(id);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config = config.with_reconnect_delay(ReconnectDelay::Fixed {
                interval: Duration::from_millis(ms),
            });
        }
        config
    }

    /// HTTP transport settings.
    pub fn transport_config(&self) -> TransportConfig {
        let timeouts = match self.read_timeout {
            Some(secs) => TimeoutConfig::heartbeat(Duration::from_secs(secs)),
            None => TimeoutConfig::unlimited(),
        };
        TransportConfig::default()
            .with_timeouts(timeouts)
            .with_max_redirects(self.max_redirects)
    }
}
