//! Transport sessions
//!
//! Sessions carry protocol state only, never credentials. Both transports
//! allocate them here: streamable HTTP on the first `initialize`, SSE when
//! the event stream opens. Expiry is idle-based with a sweeper task;
//! per-mount counts are capped with LRU eviction under pressure.

use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::GatewayConfig;

/// Outbound frame buffer per session.
const SESSION_CHANNEL_CAPACITY: usize = 64;

pub struct Session {
    pub id: String,
    pub mount_path: String,
    pub created_at: Instant,
    pub initialized: AtomicBool,
    last_seen: Mutex<Instant>,
    tx: mpsc::Sender<JsonValue>,
    rx: Mutex<Option<mpsc::Receiver<JsonValue>>>,
}

impl Session {
    fn new(mount_path: &str) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            mount_path: mount_path.to_string(),
            created_at: Instant::now(),
            initialized: AtomicBool::new(false),
            last_seen: Mutex::new(Instant::now()),
            tx,
            rx: Mutex::new(Some(rx)),
        })
    }

    pub fn touch(&self) {
        *self.last_seen.lock().expect("session clock") = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().expect("session clock").elapsed()
    }

    fn last_seen(&self) -> Instant {
        *self.last_seen.lock().expect("session clock")
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// The stream side of the channel; taken exactly once by the transport
    /// that serves this session's event stream.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<JsonValue>> {
        self.rx.lock().expect("session receiver").take()
    }

    /// Queue an outbound frame. `false` when the stream side is gone, which
    /// invalidates the session.
    pub async fn push(&self, frame: JsonValue) -> bool {
        self.tx.send(frame).await.is_ok()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("mount_path", &self.mount_path)
            .field("idle_for", &self.idle_for())
            .finish()
    }
}

/// All live sessions across mounts.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    config: Arc<GatewayConfig>,
}

impl SessionRegistry {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Allocate a session, evicting the least-recently-seen one of the same
    /// mount when the per-mount cap is hit.
    pub fn create(&self, mount_path: &str) -> Arc<Session> {
        let mount_sessions: Vec<(String, Instant)> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().mount_path == mount_path)
            .map(|entry| (entry.key().clone(), entry.value().last_seen()))
            .collect();

        if mount_sessions.len() >= self.config.max_sessions_per_mount {
            if let Some((oldest, _)) = mount_sessions.iter().min_by_key(|(_, seen)| *seen) {
                tracing::debug!(session = %oldest, mount = %mount_path, "evicting LRU session");
                self.sessions.remove(oldest);
            }
        }

        let session = Session::new(mount_path);
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(id).map(|entry| entry.value().clone())?;
        session.touch();
        Some(session)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle past the configured timeout.
    pub fn sweep(&self) {
        let idle_limit = self.config.session_idle;
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > idle_limit)
            .map(|entry| entry.key().clone())
            .collect();
        for id in expired {
            tracing::debug!(session = %id, "expiring idle session");
            self.sessions.remove(&id);
        }
    }

    /// Periodic GC loop.
    pub async fn run_sweeper(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.sweep();
        }
    }
}
