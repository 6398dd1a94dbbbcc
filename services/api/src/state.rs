//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared service
//! clients and the per-user chat sessions.

use crate::config::Config;
use omniverse_core::{ChatSession, SessionServices, media::FileUploader};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Why a session could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("Another request for this user is still in progress")]
    Busy,
    #[error("Too many active sessions, please try again later")]
    Full,
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    last_used: Instant,
}

impl SessionEntry {
    /// A guard holds its own handle on the session, so any extra handle means it is in use.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

/// One chat session per user, each behind its own lock.
///
/// A session is only handed out when nobody else holds it, which keeps a
/// user's submissions strictly one at a time. At most `capacity` sessions are
/// kept; idle ones are evicted by [`SessionRegistry::evict_idle`] or, when the
/// registry is full, least recently used first.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns the user's session, creating it on first use.
    pub async fn try_acquire(
        &self,
        user_id: &str,
        services: &SessionServices,
    ) -> Result<OwnedMutexGuard<ChatSession>, AcquireError> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            if !sessions.contains_key(user_id) && sessions.len() >= self.capacity {
                let oldest = sessions
                    .iter()
                    .filter(|(_, entry)| !entry.in_use())
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(id, _)| id.clone())
                    .ok_or(AcquireError::Full)?;
                sessions.remove(&oldest);
                debug!(user_id = %oldest, "Evicted least recently used session");
            }

            let entry = sessions
                .entry(user_id.to_string())
                .or_insert_with(|| SessionEntry {
                    session: Arc::new(Mutex::new(ChatSession::new(user_id, services.clone()))),
                    last_used: Instant::now(),
                });
            entry.last_used = Instant::now();
            entry.session.clone()
        };
        session.try_lock_owned().map_err(|_| AcquireError::Busy)
    }

    /// Drops the user's session; the next request starts a fresh one.
    pub async fn remove(&self, user_id: &str) -> bool {
        self.sessions.lock().await.remove(user_id).is_some()
    }

    /// Drops every session unused for at least `max_idle`, returning how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.in_use() || entry.last_used.elapsed() < max_idle);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub services: SessionServices,
    pub uploader: Arc<dyn FileUploader>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<Config>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use omniverse_core::{
        Dispatcher,
        llm_client::{ChatMessage, LLMClient},
        media::UnavailableMedia,
        store::InMemoryStore,
    };

    struct SilentLLM;

    #[async_trait]
    impl LLMClient for SilentLLM {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String> {
            Ok(String::new())
        }
    }

    fn services() -> SessionServices {
        SessionServices {
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(SilentLLM),
                Arc::new(UnavailableMedia),
                String::new(),
            )),
            speech: Arc::new(UnavailableMedia),
            store: Arc::new(InMemoryStore::new()),
        }
    }

    #[tokio::test]
    async fn test_busy_session_is_refused() {
        let registry = SessionRegistry::new(8);
        let services = services();

        let _held = registry.try_acquire("user-1", &services).await.unwrap();
        assert_eq!(
            registry.try_acquire("user-1", &services).await.err(),
            Some(AcquireError::Busy)
        );
        assert!(registry.try_acquire("user-2", &services).await.is_ok());
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_sessions_in_use() {
        let registry = SessionRegistry::new(8);
        let services = services();

        drop(registry.try_acquire("idle", &services).await.unwrap());
        let _held = registry.try_acquire("busy", &services).await.unwrap();
        assert_eq!(registry.len().await, 2);

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.evict_idle(Duration::from_secs(3600)).await, 0);
    }

    #[tokio::test]
    async fn test_full_registry_evicts_least_recently_used() {
        let registry = SessionRegistry::new(2);
        let services = services();

        drop(registry.try_acquire("first", &services).await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(registry.try_acquire("second", &services).await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        drop(registry.try_acquire("third", &services).await.unwrap());

        assert_eq!(registry.len().await, 2);
        assert!(!registry.remove("first").await);
        assert!(registry.remove("second").await);
        assert!(registry.remove("third").await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_full_registry_of_busy_sessions_refuses_newcomers() {
        let registry = SessionRegistry::new(1);
        let services = services();

        let _held = registry.try_acquire("first", &services).await.unwrap();
        assert_eq!(
            registry.try_acquire("second", &services).await.err(),
            Some(AcquireError::Full)
        );
        assert_eq!(registry.len().await, 1);
    }
}
