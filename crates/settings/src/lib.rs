//! OastBeacon Settings
//!
//! Configuration for the CLI and the HTTP shell.
//!
//! ## Features
//!
//! - Relay defaults (server, fallback list, scheme, timeout, label padding)
//! - HTTP shell bind address
//! - Polling interval for `watch`
//! - JSON file storage in the platform config directory
//!
//! ## Usage
//!
//! ```no_run
//! use oastbeacon_settings::Settings;
//!
//! let mut settings = Settings::load_or_default()?;
//! settings.watch.poll_interval_secs = 10;
//! settings.save()?;
//! # Ok::<(), oastbeacon_settings::SettingsError>(())
//! ```

mod config;

pub use config::{RelaySettings, ServerSettings, Settings, WatchSettings};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// `<platform config dir>/oastbeacon`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("oastbeacon")
}

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
