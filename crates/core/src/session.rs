//! Session identity and lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming::{derive_domain, generate_correlation_id, generate_secret_token, DomainPolicy};

/// Default relay used when a caller does not pick one
pub const DEFAULT_RELAY_HOST: &str = "oast.fun";

/// Default HTTPS port
pub const HTTPS_PORT: u16 = 443;

/// Default plain HTTP port
pub const HTTP_PORT: u16 = 80;

/// Lifecycle of a relay session.
///
/// `Unregistered -> Active -> Deregistered`. Nothing leaves `Deregistered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Unregistered,
    Active,
    Deregistered,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Active => "active",
            Self::Deregistered => "deregistered",
        }
    }

    /// Whether the relay will accept poll/deregister calls for this session
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the session can never be used again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deregistered)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relay endpoint for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTarget {
    /// Relay hostname (also the parent of the callback domain)
    pub host: String,
    /// Relay port; only written into URLs when it is not the scheme default
    pub port: u16,
    /// Caller's scheme preference for poll/deregister
    pub use_tls: bool,
    /// Optional `Authorization` header value, passed through untouched
    pub authorization: Option<String>,
}

impl Default for RelayTarget {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_HOST)
    }
}

impl RelayTarget {
    /// HTTPS relay on the default port, no authorization
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: HTTPS_PORT,
            use_tls: true,
            authorization: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    /// URL for `path` using the caller's scheme preference
    pub fn url(&self, path: &str) -> String {
        self.url_with_tls(self.use_tls, path)
    }

    /// URL for `path` with an explicit scheme.
    ///
    /// The configured port belongs to the caller's scheme: it is written out
    /// only when `tls` matches that scheme and the port is not its default.
    pub fn url_with_tls(&self, tls: bool, path: &str) -> String {
        let scheme = if tls { "https" } else { "http" };
        let default_port = if self.use_tls { HTTPS_PORT } else { HTTP_PORT };
        let path = path.trim_start_matches('/');

        if tls != self.use_tls || self.port == default_port {
            format!("{}://{}/{}", scheme, self.host, path)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, path)
        }
    }
}

/// Identifiers of one relay session.
///
/// The correlation id is public (it is the callback subdomain); the secret
/// token authenticates poll/deregister and doubles as the session token handed
/// to local callers.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    correlation_id: String,
    secret_token: String,
    label_padding: String,
    relay: RelayTarget,
}

impl Session {
    /// Fresh identifiers for `relay`
    pub fn new(relay: RelayTarget, policy: &DomainPolicy) -> Self {
        let correlation_id = generate_correlation_id();
        let label_padding = policy.padding_for(&correlation_id);
        Self {
            correlation_id,
            secret_token: generate_secret_token(),
            label_padding,
            relay,
        }
    }

    /// Rebuild a session from known identifiers
    pub fn from_parts(
        relay: RelayTarget,
        correlation_id: impl Into<String>,
        secret_token: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            secret_token: secret_token.into(),
            label_padding: String::new(),
            relay,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn secret_token(&self) -> &str {
        &self.secret_token
    }

    pub fn relay(&self) -> &RelayTarget {
        &self.relay
    }

    /// Callback domain for this session.
    ///
    /// Stable for the session's lifetime; the padding suffix (if any) is drawn
    /// once at creation.
    pub fn domain(&self) -> String {
        if self.correlation_id.is_empty() {
            return String::new();
        }
        let label = format!("{}{}", self.correlation_id, self.label_padding);
        derive_domain(&label, &self.relay.host)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("correlation_id", &self.correlation_id)
            .field("secret_token", &"<redacted>")
            .field("relay", &self.relay.host)
            .finish()
    }
}
