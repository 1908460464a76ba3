//! HTTP handlers for the session shell

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use oastbeacon_client::{ClientConfig, ClientError, InteractionClient, SessionHandle, SessionRegistry};
use oastbeacon_core::{HTTPS_PORT, HTTP_PORT};
use oastbeacon_settings::RelaySettings;

/// Errors answered with `400 {success: false, error}`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid or missing token")]
    InvalidToken,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// `POST /api/register` body. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterBody {
    /// Relay host
    pub server: Option<String>,
    /// Relay port
    pub port: Option<u16>,
    /// `true` for HTTPS polling, `false` for plain HTTP
    pub scheme: Option<bool>,
    /// `Authorization` header for the relay
    pub authorization: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenQuery {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeregisterBody {
    id: Option<String>,
}

/// Router state: the live sessions and the relay defaults for new ones
#[derive(Clone)]
pub struct ApiState {
    registry: SessionRegistry,
    relay: Arc<RelaySettings>,
    #[cfg(any(test, feature = "test-util"))]
    plaintext_registration: bool,
}

impl ApiState {
    pub fn new(registry: SessionRegistry, relay: RelaySettings) -> Self {
        Self {
            registry,
            relay: Arc::new(relay),
            #[cfg(any(test, feature = "test-util"))]
            plaintext_registration: false,
        }
    }

    /// Register new sessions over the requested scheme instead of HTTPS
    #[cfg(any(test, feature = "test-util"))]
    pub fn with_plaintext_registration(mut self) -> Self {
        self.plaintext_registration = true;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Relay defaults overlaid with the caller's choices.
    ///
    /// Switching scheme without naming a port moves to that scheme's default
    /// port.
    pub fn client_config(&self, body: &RegisterBody) -> ClientConfig {
        let server = body.server.as_deref().filter(|s| !s.is_empty());
        let mut config = self.relay.client_config(server);

        if let Some(use_tls) = body.scheme {
            if use_tls != config.relay.use_tls {
                config.relay.use_tls = use_tls;
                config.relay.port = if use_tls { HTTPS_PORT } else { HTTP_PORT };
            }
        }
        if let Some(port) = body.port {
            config.relay.port = port;
        }
        if let Some(authorization) = &body.authorization {
            config.relay.authorization = Some(authorization.clone());
        }
        config
    }

    fn new_client(&self, body: &RegisterBody) -> Result<InteractionClient, ClientError> {
        let client = InteractionClient::new(self.client_config(body))?;
        #[cfg(any(test, feature = "test-util"))]
        let client = if self.plaintext_registration {
            client.with_plaintext_registration()
        } else {
            client
        };
        Ok(client)
    }

    fn session(&self, token: Option<&str>) -> Result<SessionHandle, ApiError> {
        self.registry
            .get(require_token(token)?)
            .map_err(|_| ApiError::InvalidToken)
    }
}

fn require_token(token: Option<&str>) -> Result<&str, ApiError> {
    token
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::InvalidToken)
}

/// Build the shell router: the session API under `/api` plus `/health`
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/register", post(register))
        .route("/poll", get(poll))
        .route("/deregister", post(deregister))
        .route("/domain", get(domain));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn failure(error: impl ToString) -> Json<Value> {
    Json(json!({
        "success": false,
        "error": error.to_string(),
    }))
}

async fn register(State(state): State<ApiState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let body: RegisterBody = if body.is_empty() {
        RegisterBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?
    };

    let mut client = match state.new_client(&body) {
        Ok(client) => client,
        Err(e) => return Ok(failure(e)),
    };

    match client.register().await {
        Ok(registration) => {
            state
                .registry
                .put(registration.session_token.clone(), client);
            info!("Session registered, {} live", state.registry.len());
            Ok(Json(json!({
                "success": true,
                "domain": registration.domain,
                "id": registration.session_token,
                "correlation_id": registration.correlation_id,
            })))
        }
        Err(e) => {
            warn!("Registration failed: {}", e);
            Ok(failure(e))
        }
    }
}

async fn poll(
    State(state): State<ApiState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let handle = state.session(query.id.as_deref())?;
    let client = handle.lock().await;
    let polled = client.poll().await;

    match polled {
        Ok(records) => {
            debug!("Poll returned {} interactions", records.len());
            Ok(Json(json!({
                "success": true,
                "data": records,
            })))
        }
        Err(ClientError::InvalidState { .. }) => Err(ApiError::InvalidToken),
        Err(e) => Ok(failure(e)),
    }
}

async fn deregister(State(state): State<ApiState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let body: DeregisterBody = serde_json::from_slice(&body).unwrap_or_default();
    let token = body.id.as_deref();
    let handle = state.session(token)?;

    let mut client = handle.lock().await;
    let outcome = match client.deregister().await {
        Ok(outcome) => outcome,
        Err(ClientError::InvalidState { .. }) => return Err(ApiError::InvalidToken),
        Err(e) => return Ok(failure(e)),
    };
    drop(client);

    if !outcome.success {
        return Ok(failure(outcome.error.unwrap_or_default()));
    }
    if let Some(token) = token {
        state.registry.remove(token);
    }
    Ok(Json(json!({ "success": true })))
}

async fn domain(
    State(state): State<ApiState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let domain = state
        .registry
        .domain(require_token(query.id.as_deref())?)
        .map_err(|_| ApiError::InvalidToken)?;
    Ok(Json(json!({
        "success": true,
        "domain": domain,
    })))
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sessions": state.registry.len(),
    }))
}
