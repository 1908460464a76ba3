//! Client configuration

use std::time::Duration;

use oastbeacon_core::{DomainPolicy, RelayTarget};

/// `User-Agent` sent on every relay request
pub const DEFAULT_USER_AGENT: &str = concat!("oastbeacon/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout for relay calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one [`crate::InteractionClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay to register with
    pub relay: RelayTarget,
    /// HTTP client timeout, applied to each relay call
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Callback-domain label policy
    pub domain_policy: DomainPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay: RelayTarget::default(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            domain_policy: DomainPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at `relay`
    pub fn for_relay(relay: RelayTarget) -> Self {
        Self {
            relay,
            ..Default::default()
        }
    }

    /// Same settings, different relay host
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        let mut config = self.clone();
        config.relay.host = host.into();
        config
    }
}
