//! Shared fixtures: an in-process relay that speaks the real protocol
//!
//! The relay keeps the public key each session registers, encrypts queued
//! interactions under a fresh AES key on every poll, and wraps that key with
//! the session's public key, the same way a production relay does.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use oastbeacon_client::{ClientConfig, InteractionClient};
use oastbeacon_core::RelayTarget;
use oastbeacon_crypto::{seal_record, wrap_session_key, SessionKey};
use oastbeacon_daemon::{serve_listener, ApiState};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Default)]
struct RelayState {
    /// correlation id -> registered public key
    sessions: HashMap<String, String>,
    /// correlation id -> interactions not yet polled
    pending: HashMap<String, Vec<Value>>,
    /// correlation ids released by deregistration
    released: Vec<String>,
}

type Shared = Arc<Mutex<RelayState>>;

fn json_body(request: &Request) -> Option<Value> {
    serde_json::from_slice(&request.body).ok()
}

struct RegisterResponder(Shared);

impl Respond for RegisterResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(body) = json_body(request) else {
            return ResponseTemplate::new(400);
        };
        let (Some(pem), Some(cid), Some(_secret)) = (
            body["public-key"].as_str(),
            body["correlation-id"].as_str(),
            body["secret-key"].as_str(),
        ) else {
            return ResponseTemplate::new(400);
        };

        self.0
            .lock()
            .unwrap()
            .sessions
            .insert(cid.to_string(), pem.to_string());
        ResponseTemplate::new(200).set_body_json(json!({"message": "registration successful"}))
    }
}

struct PollResponder(Shared);

impl Respond for PollResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let cid = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        let mut state = self.0.lock().unwrap();
        let Some(pem) = state.sessions.get(&cid).cloned() else {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "could not get interactions"}));
        };
        let records = state.pending.remove(&cid).unwrap_or_default();

        let key = SessionKey::from_bytes(rand::random::<[u8; 32]>().to_vec());
        let aes_key = wrap_session_key(&pem, key.as_bytes()).unwrap();
        let data: Vec<String> = records
            .iter()
            .map(|record| seal_record(&key, record.to_string().as_bytes()).unwrap())
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "aes_key": aes_key,
            "data": data,
            "extra": [],
        }))
    }
}

struct DeregisterResponder(Shared);

impl Respond for DeregisterResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(cid) = json_body(request)
            .and_then(|body| body["correlation-id"].as_str().map(str::to_string))
        else {
            return ResponseTemplate::new(400);
        };

        let mut state = self.0.lock().unwrap();
        if state.sessions.remove(&cid).is_none() {
            return ResponseTemplate::new(400);
        }
        state.pending.remove(&cid);
        state.released.push(cid);
        ResponseTemplate::new(200).set_body_json(json!({"message": "deregistration successful"}))
    }
}

/// Relay double served by wiremock over plain HTTP
pub struct FakeRelay {
    server: MockServer,
    state: Shared,
}

impl FakeRelay {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Shared::default();

        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(RegisterResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/poll"))
            .respond_with(PollResponder(state.clone()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/deregister"))
            .respond_with(DeregisterResponder(state.clone()))
            .mount(&server)
            .await;

        Self { server, state }
    }

    pub fn port(&self) -> u16 {
        self.server.address().port()
    }

    /// Target for clients talking to this relay
    pub fn target(&self) -> RelayTarget {
        RelayTarget::new("127.0.0.1")
            .with_tls(false)
            .with_port(self.port())
    }

    /// Unregistered client pointed at this relay
    pub fn client(&self) -> InteractionClient {
        InteractionClient::new(ClientConfig::for_relay(self.target()))
            .unwrap()
            .with_plaintext_registration()
    }

    /// Queue an interaction for `correlation_id`
    pub fn hit(&self, correlation_id: &str, record: Value) {
        self.state
            .lock()
            .unwrap()
            .pending
            .entry(correlation_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn is_registered(&self, correlation_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .sessions
            .contains_key(correlation_id)
    }

    pub fn released(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }
}

/// A DNS interaction as the relay would report it
pub fn dns_hit(correlation_id: &str, n: usize) -> Value {
    json!({
        "protocol": "dns",
        "unique-id": correlation_id,
        "full-id": format!("{}.probe{}", correlation_id, n),
        "q-type": "A",
        "remote-address": "203.0.113.7",
        "timestamp": format!("2024-05-01T12:00:0{}Z", n),
    })
}

/// Running HTTP shell
pub struct Shell {
    pub base: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<oastbeacon_daemon::Result<()>>>,
}

impl Shell {
    pub async fn spawn(state: ApiState) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(serve_listener(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            base,
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base, route)
    }

    /// Stop the shell and wait for it to release its sessions
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.unwrap().unwrap();
        }
    }
}
