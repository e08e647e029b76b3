//! Transport configuration types.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of redirects a transport follows before giving up.
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Lowest TLS protocol version a transport negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TlsVersion {
    /// Accept TLS 1.2 and newer.
    Tls12,
    /// Accept TLS 1.3 only.
    #[default]
    Tls13,
}

/// Certificate and protocol settings for `https` streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Lowest protocol version accepted.
    pub min_version: TlsVersion,

    /// Verify the server certificate chain. Turning this off is only honoured
    /// when the transport's opt-in environment variable is set.
    pub validate_certificates: bool,

    /// Extra trust roots, each PEM or DER encoded.
    pub custom_ca_certs: Option<Vec<Vec<u8>>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls13,
            validate_certificates: true,
            custom_ca_certs: None,
        }
    }
}

impl TlsConfig {
    /// TLS 1.2 floor, for servers that have not moved to 1.3.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            ..Self::default()
        }
    }

    /// Skips certificate verification. For local development servers only.
    #[must_use]
    pub fn insecure() -> Self {
        Self {
            validate_certificates: false,
            ..Self::default()
        }
    }

    /// Adds a trust root in PEM or DER form.
    #[must_use]
    pub fn with_ca_cert(mut self, cert: impl Into<Vec<u8>>) -> Self {
        self.custom_ca_certs
            .get_or_insert_with(Vec::new)
            .push(cert.into());
        self
    }

    /// Returns `true` if certificate verification is requested off.
    #[must_use]
    pub const fn is_insecure(&self) -> bool {
        !self.validate_certificates
    }
}

/// Timeouts applied by a transport.
///
/// Event streams are long-lived, so only connection establishment is bounded
/// by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    pub connect: Duration,

    /// Whole-exchange timeout.
    /// `None` = no timeout
    pub request: Option<Duration>,

    /// Maximum silence between body chunks.
    /// `None` = no timeout
    pub read: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl TimeoutConfig {
    /// Create a configuration with no request or read timeout.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: None,
            read: None,
        }
    }

    /// Create a configuration that treats a silent stream as dead.
    ///
    /// Useful against servers that send periodic comments as keep-alives.
    #[must_use]
    pub const fn heartbeat(read: Duration) -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: None,
            read: Some(read),
        }
    }
}

/// Configuration for a streaming HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// TLS/HTTPS configuration.
    #[serde(default)]
    pub tls: TlsConfig,

    /// User agent string (set to None to disable the User-Agent header).
    pub user_agent: Option<String>,

    /// Maximum number of redirects followed per exchange.
    pub max_redirects: usize,

    /// Headers added to every request unless the request sets them itself.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            tls: TlsConfig::default(),
            user_agent: Some(format!("turbosse/{}", env!("CARGO_PKG_VERSION"))),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            default_headers: HashMap::new(),
        }
    }
}

impl TransportConfig {
    /// Sets the timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Sets or clears the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Sets the redirect limit.
    #[must_use]
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Adds a default header.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}
