//! OastBeacon Relay Client
//!
//! Talks the interaction relay protocol on behalf of one session at a time.
//!
//! ## Responsibilities
//!
//! 1. Register the session's public key, secret and correlation id
//! 2. Poll for encrypted interaction batches and decrypt them
//! 3. Deregister the session
//! 4. Track live sessions by token for concurrent callers ([`SessionRegistry`])

mod client;
mod config;
mod fallback;
mod protocol;
mod registry;

pub use client::{Deregistration, InteractionClient, Registration};
pub use config::{ClientConfig, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use fallback::register_with_fallback;
pub use protocol::{DeregisterRequest, PollResponse, RegisterRequest};
pub use registry::{RegistryError, SessionHandle, SessionRegistry};

use oastbeacon_core::SessionState;
use oastbeacon_crypto::{CodecError, KeyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Relay returned {status}")]
    RelayRejected { status: u16 },

    #[error("Invalid relay response: {0}")]
    InvalidResponse(String),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("No relay servers to try")]
    NoRelays,
}

impl ClientError {
    /// Whether calling the same operation again later may succeed.
    ///
    /// Crypto failures count as retryable: the next poll brings a fresh batch.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::InvalidResponse(_) | Self::Codec(_) => true,
            Self::RelayRejected { status } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            Self::Key(_) | Self::InvalidState { .. } | Self::NoRelays => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
