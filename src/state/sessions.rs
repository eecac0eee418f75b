use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::conversation::ConversationSession;

pub type SharedSession = Arc<Mutex<ConversationSession>>;

struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// Live conversation sessions keyed by id.
///
/// Each session sits behind its own mutex, so turns within one session run
/// one at a time while different sessions proceed concurrently. With an idle
/// TTL set, sessions untouched for longer than the TTL are dropped the next
/// time a session is created; a session with a turn in flight is kept.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    idle_ttl: Option<Duration>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Option<Duration>) -> Self {
        Self {
            idle_ttl,
            ..Self::default()
        }
    }

    pub async fn insert(&self, session: ConversationSession) -> String {
        let id = session.id().to_string();
        let mut sessions = self.sessions.write().await;
        if let Some(ttl) = self.idle_ttl {
            let before = sessions.len();
            sessions.retain(|_, entry| {
                entry.last_used.elapsed() < ttl || entry.session.try_lock().is_err()
            });
            let expired = before - sessions.len();
            if expired > 0 {
                tracing::info!("Expired {} idle session(s)", expired);
            }
        }
        sessions.insert(
            id.clone(),
            Entry {
                session: Arc::new(Mutex::new(session)),
                last_used: Instant::now(),
            },
        );
        id
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
