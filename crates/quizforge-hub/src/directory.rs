//! Session directory: every live session in the process, by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use quizforge_content::Package;
use quizforge_engine::Timings;
use quizforge_protocol::SessionId;
use tokio::sync::Mutex;

use crate::hub::spawn_session;
use crate::{HubConfig, HubError, HubHandle, SessionOptions};

/// A live session as the directory sees it.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub hub: HubHandle,
    pub options: SessionOptions,
}

impl SessionEntry {
    pub fn session_id(&self) -> SessionId {
        self.hub.session_id()
    }
}

/// Creates sessions and finds them again by id.
///
/// Owned by the server and shared as `Arc<SessionDirectory>`. The map is
/// behind one async mutex that is only held for inserts, lookups and
/// removals. Each session gets a reaper task that removes its entry once
/// the session's hub stops.
#[derive(Debug)]
pub struct SessionDirectory {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
    config: HubConfig,
    timings: Timings,
}

impl SessionDirectory {
    pub fn new(config: HubConfig, timings: Timings) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            timings,
        }
    }

    /// Starts a new session and records it. Ids start at 1.
    pub async fn create(self: &Arc<Self>, options: SessionOptions, package: Arc<Package>) -> SessionEntry {
        let session_id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (hub, task) = spawn_session(
            session_id,
            &options,
            package,
            self.timings.clone(),
            &self.config,
        );
        let entry = SessionEntry { hub, options };

        self.sessions.lock().await.insert(session_id, entry.clone());
        tracing::info!(
            %session_id,
            name = %entry.options.name,
            pack_id = %entry.options.pack_id,
            max_players = entry.options.max_players,
            "session created"
        );

        let directory = Arc::clone(self);
        tokio::spawn(async move {
            let _ = task.await;
            if directory.remove(session_id).await.is_some() {
                tracing::info!(%session_id, "session removed");
            }
        });

        entry
    }

    pub async fn lookup(&self, session_id: SessionId) -> Result<SessionEntry, HubError> {
        self.sessions
            .lock()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(HubError::NotFound(session_id))
    }

    pub async fn remove(&self, session_id: SessionId) -> Option<SessionEntry> {
        self.sessions.lock().await.remove(&session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Asks every session to shut down.
    pub async fn shutdown_all(&self) {
        let hubs: Vec<HubHandle> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|entry| entry.hub.clone())
            .collect();
        for hub in hubs {
            let _ = hub.shutdown().await;
        }
    }
}
