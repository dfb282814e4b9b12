//! Session Registry (C2): live client channels by user id
//!
//! A session is an SSE channel accepted by the request surface and handed
//! to the registry via `attach`. `broadcast`/`send_to` build the payload
//! once and dispatch it to every matching channel; a channel that fails
//! to accept a send is detached immediately.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::constants::DEFAULT_USER_ID;

/// One live event, as delivered to an SSE channel.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

pub type SessionId = u64;

/// Sending half of a session's channel, owned by the Registry.
struct Channel {
    user_id: String,
    tx: mpsc::Sender<SessionEvent>,
}

/// Tracks live client sessions keyed by user id, for fan-out broadcast.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Channel>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Accept a new session for `user_id` (defaults to the single local
    /// user when auth is disabled). Returns the session id and the
    /// receiving half the caller wires into its SSE response stream.
    pub fn attach(&self, user_id: Option<&str>) -> (SessionId, mpsc::Receiver<SessionEvent>) {
        let user_id = user_id.unwrap_or(DEFAULT_USER_ID).to_string();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(256);
        self.sessions.insert(id, Channel { user_id, tx });
        (id, rx)
    }

    pub fn detach(&self, id: SessionId) {
        self.sessions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Deliver `event` to every live channel. Returns the ids of channels
    /// that failed to accept the send (and were detached).
    pub async fn broadcast(&self, event: SessionEvent) -> Vec<SessionId> {
        let targets: Vec<SessionId> = self.sessions.iter().map(|e| *e.key()).collect();
        self.dispatch(&targets, event).await
    }

    /// Deliver `event` only to channels belonging to `user_id`.
    pub async fn send_to(&self, user_id: &str, event: SessionEvent) -> Vec<SessionId> {
        let targets: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| *e.key())
            .collect();
        self.dispatch(&targets, event).await
    }

    async fn dispatch(&self, targets: &[SessionId], event: SessionEvent) -> Vec<SessionId> {
        let mut failed = Vec::new();
        for id in targets {
            let Some(entry) = self.sessions.get(id) else {
                continue;
            };
            let tx = entry.tx.clone();
            drop(entry);
            if tx.send(event.clone()).await.is_err() {
                failed.push(*id);
            }
        }
        for id in &failed {
            self.detach(*id);
        }
        failed
    }
}
