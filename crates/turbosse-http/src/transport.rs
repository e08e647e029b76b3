//! Streaming HTTP exchange over reqwest.
//!
//! Each [`Transport::issue`] spawns one task that sends the request, surfaces
//! redirects to the consumer instead of following them silently, then forwards
//! the response body chunk by chunk. The client is built with redirects
//! disabled and no overall request timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use futures::StreamExt;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use reqwest::Client as HttpClient;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use turbosse_transport_traits::{
    AtomicMetrics, ExchangeHandle, StreamRequest, TlsConfig, TlsVersion, Transport,
    TransportConfig, TransportError, TransportEventSender, TransportMetrics, TransportResult,
};

/// Opt-in required before certificate validation may be disabled.
const INSECURE_TLS_ENV_VAR: &str = "TURBOSSE_ALLOW_INSECURE_TLS";

/// Streaming HTTP transport backed by a shared reqwest client.
pub struct HttpTransport {
    config: TransportConfig,
    http_client: HttpClient,
    metrics: Arc<AtomicMetrics>,
    next_id: AtomicU64,
    exchanges: DashMap<u64, AbortHandle>,
    invalidated: AtomicBool,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("max_redirects", &self.config.max_redirects)
            .field("active_exchanges", &self.exchanges.len())
            .field("invalidated", &self.invalidated.load(Ordering::Relaxed))
            .finish()
    }
}

impl HttpTransport {
    /// Builds the transport and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConfigurationError`] if a default header is
    /// invalid or the client cannot be built.
    pub fn new(config: TransportConfig) -> TransportResult<Self> {
        let mut client_builder = HttpClient::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.timeouts.connect)
            .default_headers(default_headers(&config)?);

        if let Some(timeout) = config.timeouts.request {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(user_agent) = &config.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        }

        client_builder = apply_tls(client_builder, &config.tls);

        let http_client = client_builder.build().map_err(|e| {
            TransportError::ConfigurationError(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            config,
            http_client,
            metrics: Arc::new(AtomicMetrics::new()),
            next_id: AtomicU64::new(1),
            exchanges: DashMap::new(),
            invalidated: AtomicBool::new(false),
        })
    }

    /// The configuration the transport was built with.
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns `true` once [`invalidate`](Transport::invalidate) has been called.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }
}

impl Transport for HttpTransport {
    fn issue(&self, request: StreamRequest, events: TransportEventSender) -> ExchangeHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if self.is_invalidated() {
            warn!(exchange = id, "Transport invalidated, refusing request");
            let task = tokio::spawn(async move {
                events
                    .completed(
                        None,
                        Some(TransportError::ConnectionFailed(
                            "transport has been invalidated".to_string(),
                        )),
                    )
                    .await;
            });
            return ExchangeHandle::with_abort(id, task.abort_handle());
        }

        info!(exchange = id, request = %request, "Issuing streaming request");
        let exchange = Exchange {
            id,
            client: self.http_client.clone(),
            metrics: Arc::clone(&self.metrics),
            max_redirects: self.config.max_redirects,
            read_timeout: self.config.timeouts.read,
            connect_timeout: self.config.timeouts.connect,
            events,
        };
        let task = tokio::spawn(exchange.run(request));

        self.exchanges.retain(|_, handle| !handle.is_finished());
        self.exchanges.insert(id, task.abort_handle());
        ExchangeHandle::with_abort(id, task.abort_handle())
    }

    fn cancel(&self, handle: ExchangeHandle) {
        debug!(exchange = handle.id(), "Cancelling exchange");
        self.exchanges.remove(&handle.id());
        handle.abort();
    }

    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
        let count = self.exchanges.len();
        self.exchanges.retain(|_, handle| {
            handle.abort();
            false
        });
        info!(cancelled = count, "Transport invalidated");
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

/// Converts the configured default headers into a header map.
fn default_headers(config: &TransportConfig) -> TransportResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.default_headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::ConfigurationError(format!("Invalid default header name {name:?}: {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::ConfigurationError(format!("Invalid value for header {name}: {e}"))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn apply_tls(
    mut client_builder: reqwest::ClientBuilder,
    tls: &TlsConfig,
) -> reqwest::ClientBuilder {
    client_builder = match tls.min_version {
        TlsVersion::Tls12 => client_builder.min_tls_version(reqwest::tls::Version::TLS_1_2),
        TlsVersion::Tls13 => client_builder.min_tls_version(reqwest::tls::Version::TLS_1_3),
    };

    if tls.is_insecure() {
        if std::env::var(INSECURE_TLS_ENV_VAR).is_err() {
            error!(
                "SECURITY: Certificate validation disabled but {} not set. \
                 Keeping certificate validation enabled. Set {}=1 to allow insecure TLS.",
                INSECURE_TLS_ENV_VAR, INSECURE_TLS_ENV_VAR
            );
        } else {
            warn!(
                "SECURITY WARNING: TLS certificate validation is DISABLED. \
                 Only use this against development servers."
            );
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }
    }

    if let Some(ca_certs) = &tls.custom_ca_certs {
        let total = ca_certs.len();
        let mut loaded = 0usize;
        for cert_bytes in ca_certs {
            let cert = reqwest::Certificate::from_pem(cert_bytes)
                .or_else(|_| reqwest::Certificate::from_der(cert_bytes));
            match cert {
                Ok(cert) => {
                    client_builder = client_builder.add_root_certificate(cert);
                    loaded += 1;
                }
                Err(e) => warn!(error = %e, "Failed to parse custom CA certificate, skipping"),
            }
        }
        if loaded == 0 && total > 0 {
            error!("All {} custom CA certificates failed to parse", total);
        } else if loaded > 0 {
            info!("Loaded {}/{} custom CA certificates", loaded, total);
        }
    }

    client_builder
}

/// Returns `true` for the statuses whose `Location` is surfaced as a redirect.
fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Builds the request a redirect points at.
///
/// `Location` is resolved against the current URL. 303 switches to `GET`, as do
/// 301 and 302 for anything but `GET`/`HEAD`. Headers are left to the consumer.
pub(crate) fn redirect_target(
    current: &StreamRequest,
    status: StatusCode,
    location: &HeaderValue,
) -> TransportResult<StreamRequest> {
    let location = location
        .to_str()
        .map_err(|e| TransportError::InvalidRedirect(format!("non-ASCII Location header: {e}")))?;
    let url = current
        .url
        .join(location)
        .map_err(|e| TransportError::InvalidRedirect(format!("{location}: {e}")))?;

    let keeps_method = current.method == Method::GET || current.method == Method::HEAD;
    let method = match status {
        StatusCode::SEE_OTHER if current.method != Method::HEAD => Method::GET,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if !keeps_method => Method::GET,
        _ => current.method.clone(),
    };

    Ok(StreamRequest::get(url).with_method(method))
}

/// Decrements the active exchange count however the task ends, abort included.
struct ActiveGuard(Arc<AtomicMetrics>);

impl ActiveGuard {
    fn new(metrics: Arc<AtomicMetrics>) -> Self {
        metrics.exchanges.fetch_add(1, Ordering::Relaxed);
        metrics.active_exchanges.fetch_add(1, Ordering::Relaxed);
        Self(metrics)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active_exchanges.fetch_sub(1, Ordering::Relaxed);
    }
}

/// One spawned exchange.
struct Exchange {
    id: u64,
    client: HttpClient,
    metrics: Arc<AtomicMetrics>,
    max_redirects: usize,
    read_timeout: Option<std::time::Duration>,
    connect_timeout: std::time::Duration,
    events: TransportEventSender,
}

impl Exchange {
    async fn run(self, request: StreamRequest) {
        let _active = ActiveGuard::new(Arc::clone(&self.metrics));
        let (status, error) = self.drive(request).await;

        if let Some(error) = &error {
            self.metrics.failed_exchanges.fetch_add(1, Ordering::Relaxed);
            warn!(exchange = self.id, status, error = %error, "Exchange ended with error");
        } else {
            debug!(exchange = self.id, status, "Exchange completed");
        }
        self.events.completed(status, error).await;
    }

    /// Runs the exchange to the end. Returns the last status seen and the error
    /// that ended it, if any.
    async fn drive(&self, mut request: StreamRequest) -> (Option<u16>, Option<TransportError>) {
        let started = Instant::now();
        let mut redirects = 0usize;

        let response = loop {
            let response = match self.send(&request).await {
                Ok(response) => response,
                Err(e) => return (None, Some(e)),
            };
            let status = response.status();

            let Some(location) = response
                .headers()
                .get(header::LOCATION)
                .filter(|_| is_redirect(status))
            else {
                break response;
            };

            if redirects >= self.max_redirects {
                return (
                    Some(status.as_u16()),
                    Some(TransportError::TooManyRedirects {
                        max: self.max_redirects,
                    }),
                );
            }
            let target = match redirect_target(&request, status, location) {
                Ok(target) => target,
                Err(e) => return (Some(status.as_u16()), Some(e)),
            };
            redirects += 1;
            self.metrics.redirects.fetch_add(1, Ordering::Relaxed);
            debug!(exchange = self.id, status = status.as_u16(), target = %target, "Proposing redirect");

            match self.events.redirect(status.as_u16(), target).await {
                Some(next) => request = next,
                None => {
                    debug!(exchange = self.id, "Redirect refused");
                    return (Some(status.as_u16()), None);
                }
            }
        };

        let status = response.status().as_u16();
        self.metrics
            .update_time_to_headers_us(started.elapsed().as_micros() as u64);
        if !self.events.response(status).await {
            return (Some(status), None);
        }

        let mut body = response.bytes_stream();
        loop {
            let next = match self.read_timeout {
                Some(read_timeout) => match tokio::time::timeout(read_timeout, body.next()).await {
                    Ok(next) => next,
                    Err(_) => return (Some(status), Some(TransportError::Timeout)),
                },
                None => body.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.metrics.record_chunk(chunk.len());
                    if !self.events.chunk(chunk).await {
                        return (Some(status), None);
                    }
                }
                Some(Err(e)) => {
                    return (Some(status), Some(TransportError::ConnectionLost(e.to_string())));
                }
                None => return (Some(status), None),
            }
        }
    }

    async fn send(&self, request: &StreamRequest) -> TransportResult<reqwest::Response> {
        self.client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| self.classify(request, &e))
    }

    fn classify(&self, request: &StreamRequest, err: &reqwest::Error) -> TransportError {
        if err.is_connect() && err.is_timeout() {
            TransportError::ConnectionTimeout {
                url: request.url.to_string(),
                timeout: self.connect_timeout,
            }
        } else if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::ConnectionFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(method: Method) -> StreamRequest {
        StreamRequest::parse("http://localhost:8080/stream/events")
            .unwrap()
            .with_method(method)
    }

    #[test]
    fn test_redirect_target_resolves_relative_location() {
        let target = redirect_target(
            &request(Method::GET),
            StatusCode::TEMPORARY_REDIRECT,
            &HeaderValue::from_static("../other?x=1"),
        )
        .unwrap();

        assert_eq!(target.url.as_str(), "http://localhost:8080/other?x=1");
        assert_eq!(target.method, Method::GET);
        assert!(target.headers.is_empty());
    }

    #[test]
    fn test_redirect_target_absolute_location() {
        let target = redirect_target(
            &request(Method::GET),
            StatusCode::FOUND,
            &HeaderValue::from_static("https://mirror.example.com/events"),
        )
        .unwrap();
        assert_eq!(target.url.as_str(), "https://mirror.example.com/events");
    }

    #[test]
    fn test_redirect_method_rewriting() {
        let location = HeaderValue::from_static("/next");

        let see_other = redirect_target(&request(Method::POST), StatusCode::SEE_OTHER, &location);
        assert_eq!(see_other.unwrap().method, Method::GET);

        let found = redirect_target(&request(Method::POST), StatusCode::FOUND, &location);
        assert_eq!(found.unwrap().method, Method::GET);

        let temporary = redirect_target(
            &request(Method::POST),
            StatusCode::TEMPORARY_REDIRECT,
            &location,
        );
        assert_eq!(temporary.unwrap().method, Method::POST);

        let head = redirect_target(&request(Method::HEAD), StatusCode::SEE_OTHER, &location);
        assert_eq!(head.unwrap().method, Method::HEAD);
    }

    #[test]
    fn test_redirect_target_invalid_location() {
        let err = redirect_target(
            &request(Method::GET),
            StatusCode::FOUND,
            &HeaderValue::from_bytes(b"http://\xff").unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRedirect(_)));
    }

    #[test]
    fn test_is_redirect() {
        assert!(is_redirect(StatusCode::MOVED_PERMANENTLY));
        assert!(is_redirect(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_redirect(StatusCode::NOT_MODIFIED));
        assert!(!is_redirect(StatusCode::OK));
    }

    #[test]
    fn test_invalid_default_header_rejected() {
        let config = TransportConfig::default().with_default_header("bad header", "x");
        assert!(matches!(
            HttpTransport::new(config),
            Err(TransportError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_creation() {
        let transport = HttpTransport::new(TransportConfig::default()).unwrap();
        assert!(!transport.is_invalidated());
        assert_eq!(transport.metrics(), TransportMetrics::default());
        assert_eq!(transport.config().max_redirects, 10);
    }

    #[tokio::test]
    async fn test_invalidated_transport_refuses_requests() {
        let transport = HttpTransport::new(TransportConfig::default()).unwrap();
        transport.invalidate();
        assert!(transport.is_invalidated());

        let (events, mut rx) = turbosse_transport_traits::transport_channel(4);
        let _handle = transport.issue(request(Method::GET), events);

        match rx.recv().await {
            Some(turbosse_transport_traits::TransportEvent::Completed { status, error }) => {
                assert_eq!(status, None);
                assert!(matches!(error, Some(TransportError::ConnectionFailed(_))));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
