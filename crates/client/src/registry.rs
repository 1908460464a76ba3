//! Live sessions keyed by session token
//!
//! Shared between concurrently running request handlers. The map lock is held
//! only for lookups and updates, never across I/O; each session carries its
//! own async mutex so operations on one session are serialized while different
//! sessions proceed independently. The callback domain is cached beside each
//! handle so it can be read while the session is busy.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::InteractionClient;

/// Exclusive handle to one live session
pub type SessionHandle = Arc<Mutex<InteractionClient>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown session token")]
    NotFound,
}

struct SessionEntry {
    handle: SessionHandle,
    domain: String,
}

/// Token -> session map. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session stored under `token`
    pub fn put(&self, token: impl Into<String>, client: InteractionClient) -> SessionHandle {
        let domain = client.domain();
        let handle = Arc::new(Mutex::new(client));
        let entry = SessionEntry {
            handle: handle.clone(),
            domain,
        };
        self.sessions.write().insert(token.into(), entry);
        handle
    }

    pub fn get(&self, token: &str) -> Result<SessionHandle, RegistryError> {
        self.sessions
            .read()
            .get(token)
            .map(|entry| entry.handle.clone())
            .ok_or(RegistryError::NotFound)
    }

    /// Callback domain for `token`, without waiting on the session lock
    pub fn domain(&self, token: &str) -> Result<String, RegistryError> {
        self.sessions
            .read()
            .get(token)
            .map(|entry| entry.domain.clone())
            .ok_or(RegistryError::NotFound)
    }

    /// Drop the entry for `token`, if any
    pub fn remove(&self, token: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().remove(token);
        if removed.is_some() {
            debug!("Removed session {} from registry", prefix(token));
        }
        removed.map(|entry| entry.handle)
    }

    /// Remove `token` and retire its session so stray handles cannot poll it
    pub async fn evict(&self, token: &str) -> bool {
        let Some(handle) = self.remove(token) else {
            return false;
        };
        handle.lock().await.evict();
        true
    }

    /// Deregister every active session, then evict all entries.
    ///
    /// Relay failures are logged and otherwise ignored.
    pub async fn shutdown(&self) -> usize {
        let tokens = self.tokens();
        let mut released = 0;

        for token in &tokens {
            let Ok(handle) = self.get(token) else {
                continue;
            };
            let mut client = handle.lock().await;
            if client.state().is_active() {
                if let Ok(outcome) = client.deregister().await {
                    if outcome.success {
                        released += 1;
                    }
                }
            }
            client.evict();
            drop(client);
            self.remove(token);
        }

        info!(
            "Released {}/{} sessions on shutdown",
            released,
            tokens.len()
        );
        released
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}

fn prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
