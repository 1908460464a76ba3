//! Relay session client
//!
//! Owns one session's lifecycle:
//! 1. `register` - generate keys if needed, announce them to the relay
//! 2. `poll` - fetch and decrypt pending interactions
//! 3. `deregister` - release the session on the relay

use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use oastbeacon_core::{InteractionRecord, Session, SessionState};
use oastbeacon_crypto::{decrypt_interactions, unwrap_session_key, KeyManager};

use crate::protocol::{DeregisterRequest, PollResponse, RegisterRequest};
use crate::{ClientConfig, ClientError, Result};

/// Successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// Callback domain to hand out to targets
    pub domain: String,
    /// Token that identifies the session to local callers (the secret key)
    pub session_token: String,
    pub correlation_id: String,
}

/// Outcome of a deregistration attempt.
///
/// A failed attempt leaves the session active so it can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deregistration {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Deregistration {
    fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Client for a single relay session
pub struct InteractionClient {
    session: Session,
    keys: KeyManager,
    state: SessionState,
    http: reqwest::Client,
    /// Registration always goes over TLS outside of local relay stubs
    register_tls: bool,
}

impl InteractionClient {
    /// Create an unregistered client with fresh session identifiers.
    ///
    /// No keys are generated and no request is sent until [`Self::register`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            session: Session::new(config.relay, &config.domain_policy),
            keys: KeyManager::new(),
            state: SessionState::Unregistered,
            http,
            register_tls: true,
        })
    }

    /// Register over the caller's scheme instead of forced HTTPS
    #[cfg(any(test, feature = "test-util"))]
    pub fn with_plaintext_registration(mut self) -> Self {
        self.register_tls = self.session.relay().use_tls;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn correlation_id(&self) -> &str {
        self.session.correlation_id()
    }

    /// Token local callers use to address this session
    pub fn session_token(&self) -> &str {
        self.session.secret_token()
    }

    /// Callback domain; valid in every state
    pub fn domain(&self) -> String {
        self.session.domain()
    }

    /// PEM public key sent at registration
    pub fn public_key_pem(&self) -> Result<String> {
        Ok(self.keys.export_public_key()?)
    }

    /// Register the session with the relay.
    ///
    /// Generates the keypair on first use. On any failure the session stays
    /// unregistered and the call may be retried.
    pub async fn register(&mut self) -> Result<Registration> {
        self.require_state("register", SessionState::Unregistered)?;

        self.keys.generate_keypair()?;
        let body = RegisterRequest {
            public_key: self.keys.export_public_key()?,
            secret_key: self.session.secret_token().to_string(),
            correlation_id: self.session.correlation_id().to_string(),
        };

        let url = self.session.relay().url_with_tls(self.register_tls, "register");
        debug!("Registering session {} at {}", self.token_prefix(), url);

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                "Registration of session {} rejected by {}: {}",
                self.token_prefix(),
                self.session.relay().host,
                status
            );
            return Err(ClientError::RelayRejected {
                status: status.as_u16(),
            });
        }

        self.state = SessionState::Active;
        info!(
            "Registered session {} as {}",
            self.token_prefix(),
            self.domain()
        );

        Ok(Registration {
            domain: self.domain(),
            session_token: self.session.secret_token().to_string(),
            correlation_id: self.session.correlation_id().to_string(),
        })
    }

    /// Fetch and decrypt pending interactions, oldest first.
    ///
    /// Only valid while active. A payload that fails to decrypt or parse fails
    /// the whole poll; no partial batches are returned.
    pub async fn poll(&self) -> Result<Vec<InteractionRecord>> {
        self.require_state("poll", SessionState::Active)?;

        let url = self.session.relay().url("poll");
        let response = self
            .authorized(self.http.get(&url))
            .query(&[
                ("id", self.session.correlation_id()),
                ("secret", self.session.secret_token()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Poll for session {} failed: {}", self.token_prefix(), status);
            return Err(ClientError::RelayRejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let batch: PollResponse = serde_json::from_slice(&body)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        self.open_batch(batch)
    }

    /// A present `aes_key` is unwrapped even when the batch is empty.
    fn open_batch(&self, batch: PollResponse) -> Result<Vec<InteractionRecord>> {
        let payloads = batch.data.unwrap_or_default();
        let key = match batch.aes_key {
            Some(wrapped) => unwrap_session_key(&wrapped, self.keys.private_key()?)?,
            None if payloads.is_empty() => return Ok(Vec::new()),
            None => {
                return Err(ClientError::InvalidResponse(
                    "missing aes_key".to_string(),
                ))
            }
        };

        let records = decrypt_interactions(&key, &payloads)?;

        debug!(
            "Decrypted {} interactions for session {}",
            records.len(),
            self.token_prefix()
        );
        Ok(records)
    }

    /// Release the session on the relay.
    ///
    /// Relay rejections and transport failures are reported as
    /// `success: false` and leave the session active. Only calling this
    /// outside the active state is an error.
    pub async fn deregister(&mut self) -> Result<Deregistration> {
        self.require_state("deregister", SessionState::Active)?;

        match self.send_deregister().await {
            Ok(()) => {
                self.state = SessionState::Deregistered;
                info!("Deregistered session {}", self.token_prefix());
                Ok(Deregistration::succeeded())
            }
            Err(e) => {
                warn!(
                    "Deregistration of session {} failed: {}",
                    self.token_prefix(),
                    e
                );
                Ok(Deregistration::failed(e.to_string()))
            }
        }
    }

    async fn send_deregister(&self) -> Result<()> {
        let body = DeregisterRequest {
            correlation_id: self.session.correlation_id().to_string(),
            secret_key: self.session.secret_token().to_string(),
        };

        let url = self.session.relay().url("deregister");
        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::RelayRejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Retire the session locally without contacting the relay
    pub fn evict(&mut self) {
        if self.state != SessionState::Deregistered {
            debug!("Evicting session {} ({})", self.token_prefix(), self.state);
            self.state = SessionState::Deregistered;
        }
    }

    fn require_state(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(ClientError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session.relay().authorization {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Log-safe prefix of the session token
    fn token_prefix(&self) -> &str {
        let token = self.session.secret_token();
        token.get(..8).unwrap_or(token)
    }
}

impl std::fmt::Debug for InteractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionClient")
            .field("session", &self.session)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
