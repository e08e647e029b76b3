//! # TurboSSE CLI
//!
//! Tail a Server-Sent Events endpoint from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Print every field line
//! turbosse https://example.com/events
//!
//! # Authenticated completion stream that ends on a sentinel payload
//! turbosse https://api.example.com/v1/stream \
//!   -H 'Authorization: Bearer TOKEN' --done-token '[DONE]' --json
//!
//! # Resume from an event id, waiting a second between reconnects
//! turbosse https://example.com/events --last-event-id 42 --reconnect-delay-ms 1000 -v
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the `-v`/`-q` level.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod cli;
pub mod error;
pub mod output;

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use turbosse::{EventSource, HttpTransport, Transport};

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use output::OutputFormat;

/// Parses arguments and runs until the stream ends.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    stream(&cli).await
}

/// Initializes the stderr log subscriber.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Streams events from `cli.url` to stdout until completion, failure or Ctrl-C.
pub async fn stream(cli: &Cli) -> CliResult<()> {
    let request = cli.request()?;
    let transport = Arc::new(HttpTransport::new(cli.transport_config())?);
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let source = EventSource::connect(request, transport.clone(), cli.event_source_config())?;
    let (handle, mut events) = source.split();
    let mut stdout = std::io::stdout().lock();

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => output::write_event(&mut stdout, &event, format)?,
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, disconnecting");
                if let Err(err) = handle.disconnect() {
                    warn!(error = %err, "Event source already stopped");
                }
                transport.invalidate();
                break;
            }
        }
    }

    let metrics = transport.metrics();
    info!(
        exchanges = metrics.exchanges,
        redirects = metrics.redirects,
        bytes = metrics.bytes_received,
        "Stream ended"
    );
    Ok(())
}
