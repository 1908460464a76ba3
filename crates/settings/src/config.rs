//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use oastbeacon_client::{ClientConfig, DEFAULT_USER_AGENT};
use oastbeacon_core::{DomainPolicy, RelayTarget, DEFAULT_RELAY_HOST, HTTPS_PORT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Relay defaults for new sessions
    #[serde(default)]
    pub relay: RelaySettings,

    /// HTTP shell settings
    #[serde(default)]
    pub server: ServerSettings,

    /// `watch` command settings
    #[serde(default)]
    pub watch: WatchSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.clone());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.clone());
            Ok(settings)
        }
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Path this instance was loaded from, if any
    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }
}

/// Relay defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Relay used when none is given
    #[serde(default = "default_server")]
    pub default_server: String,

    /// Relays tried in order when the preferred one refuses registration
    #[serde(default = "default_known_servers")]
    pub known_servers: Vec<String>,

    /// Relay port for the preferred scheme
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use HTTPS for poll and deregister
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// `Authorization` header for private relays
    #[serde(default)]
    pub authorization: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// `User-Agent` header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum callback label length, if the relay enforces one
    #[serde(default)]
    pub pad_to: Option<usize>,
}

fn default_server() -> String {
    DEFAULT_RELAY_HOST.to_string()
}

fn default_known_servers() -> Vec<String> {
    [
        "oast.fun",
        "oast.pro",
        "oast.live",
        "oast.site",
        "oast.online",
        "oast.me",
        "interact.sh",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_port() -> u16 {
    HTTPS_PORT
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            default_server: default_server(),
            known_servers: default_known_servers(),
            port: default_port(),
            use_tls: true,
            authorization: None,
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            pad_to: None,
        }
    }
}

impl RelaySettings {
    /// Client configuration for `server`, or for `default_server` when `None`
    pub fn client_config(&self, server: Option<&str>) -> ClientConfig {
        let host = server.unwrap_or(&self.default_server);
        let mut relay = RelayTarget::new(host)
            .with_port(self.port)
            .with_tls(self.use_tls);
        if let Some(authorization) = &self.authorization {
            relay = relay.with_authorization(authorization.clone());
        }

        ClientConfig {
            relay,
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            domain_policy: DomainPolicy {
                pad_to: self.pad_to,
            },
        }
    }

    /// `preferred` first, then every known relay not already listed
    pub fn candidate_servers(&self, preferred: Option<&str>) -> Vec<String> {
        let first = preferred.unwrap_or(&self.default_server).to_string();
        let mut servers = vec![first];
        for server in &self.known_servers {
            if !servers.contains(server) {
                servers.push(server.clone());
            }
        }
        servers
    }
}

/// HTTP shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address for the shell
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// `watch` command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Seconds between polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}
