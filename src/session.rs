use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::tmdb::TmdbApi;
use crate::view::ViewController;

pub const SESSION_COOKIE: &str = "reelview_session";
const SESSION_IDLE_SECS: i64 = 3600;
const MAX_SESSIONS: usize = 10_000;

struct SessionEntry {
    controller: Arc<ViewController>,
    last_seen: i64,
}

pub struct SessionHandle {
    pub id: String,
    pub controller: Arc<ViewController>,
    pub created: bool,
}

pub struct SessionStore {
    tmdb: Arc<dyn TmdbApi>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    counter: AtomicU64,
}

impl SessionStore {
    pub fn new(tmdb: Arc<dyn TmdbApi>) -> Self {
        Self {
            tmdb,
            sessions: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Looks up an existing session without creating one.
    pub async fn get(&self, id: Option<&str>) -> Option<Arc<ViewController>> {
        let mut guard = self.sessions.lock().await;
        let entry = guard.get_mut(id?)?;
        entry.last_seen = Utc::now().timestamp();
        Some(entry.controller.clone())
    }

    /// Returns the controller for `id`, or a fresh session when `id` is unknown.
    pub async fn get_or_create(&self, id: Option<&str>) -> SessionHandle {
        let now = Utc::now().timestamp();
        let mut guard = self.sessions.lock().await;

        if let Some(id) = id {
            if let Some(entry) = guard.get_mut(id) {
                entry.last_seen = now;
                return SessionHandle {
                    id: id.to_string(),
                    controller: entry.controller.clone(),
                    created: false,
                };
            }
        }

        if guard.len() >= MAX_SESSIONS {
            guard.retain(|_, s| now - s.last_seen <= SESSION_IDLE_SECS);
            if guard.len() >= MAX_SESSIONS {
                warn!("Session store full ({} entries), clearing", guard.len());
                guard.clear();
            }
        }

        let id = self.next_id(now);
        let controller = Arc::new(ViewController::new(self.tmdb.clone()));
        guard.insert(
            id.clone(),
            SessionEntry {
                controller: controller.clone(),
                last_seen: now,
            },
        );
        debug!(sessions = guard.len(), "Created session");
        SessionHandle {
            id,
            controller,
            created: true,
        }
    }

    fn next_id(&self, now: i64) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = Utc::now().timestamp_subsec_nanos();
        let mut hasher = Sha256::new();
        hasher.update(seq.to_le_bytes());
        hasher.update(now.to_le_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    #[cfg(test)]
    async fn backdate(&self, id: &str, secs: i64) {
        if let Some(entry) = self.sessions.lock().await.get_mut(id) {
            entry.last_seen -= secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaDetail, MediaSummary, Page};

    struct NoopTmdb;

    #[async_trait::async_trait]
    impl TmdbApi for NoopTmdb {
        async fn popular_movies(&self, _page: Page) -> Vec<MediaSummary> {
            Vec::new()
        }
        async fn popular_shows(&self, _page: Page) -> Vec<MediaSummary> {
            Vec::new()
        }
        async fn movie_detail(&self, _id: i64) -> Option<MediaDetail> {
            None
        }
        async fn show_detail(&self, _id: i64) -> Option<MediaDetail> {
            None
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(NoopTmdb))
    }

    #[tokio::test]
    async fn reuses_known_session() {
        let store = store();
        let first = store.get_or_create(None).await;
        assert!(first.created);
        assert_eq!(first.id.len(), 32);

        let again = store.get_or_create(Some(&first.id)).await;
        assert!(!again.created);
        assert_eq!(again.id, first.id);
        assert!(Arc::ptr_eq(&again.controller, &first.controller));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn lookup_never_creates() {
        let store = store();
        assert!(store.get(None).await.is_none());
        assert!(store.get(Some("missing")).await.is_none());
        assert_eq!(store.len().await, 0);

        let created = store.get_or_create(None).await;
        let found = store.get(Some(&created.id)).await.expect("session exists");
        assert!(Arc::ptr_eq(&found, &created.controller));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_id_gets_fresh_session() {
        let store = store();
        let handle = store.get_or_create(Some("stale-cookie")).await;
        assert!(handle.created);
        assert_ne!(handle.id, "stale-cookie");
    }

    #[tokio::test]
    async fn ids_are_distinct() {
        let store = store();
        let a = store.get_or_create(None).await;
        let b = store.get_or_create(None).await;
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn evicts_idle_sessions_when_full() {
        let store = store();
        let idle = store.get_or_create(None).await;
        store.backdate(&idle.id, SESSION_IDLE_SECS + 10).await;
        {
            let mut guard = store.sessions.lock().await;
            let now = Utc::now().timestamp();
            for i in 0..MAX_SESSIONS - 1 {
                guard.insert(
                    format!("filler-{i}"),
                    SessionEntry {
                        controller: Arc::new(ViewController::new(Arc::new(NoopTmdb))),
                        last_seen: now,
                    },
                );
            }
        }

        let fresh = store.get_or_create(None).await;
        assert!(fresh.created);
        let guard = store.sessions.lock().await;
        assert!(!guard.contains_key(&idle.id));
        assert!(guard.contains_key(&fresh.id));
        assert!(guard.contains_key("filler-0"));
        assert_eq!(guard.len(), MAX_SESSIONS);
    }
}
