//! In-memory session store — process-lifetime conversation threads.

use anmi_core::error::SessionError;
use anmi_core::message::{Conversation, Message, SessionId};
use anmi_core::session::{SessionHandle, SessionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Sessions keyed by caller-supplied id, each behind its own lock.
///
/// The map shard lock is only held long enough to clone the session's
/// `Arc`, so turns on different sessions never wait on each other.
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Arc<Mutex<Conversation>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    fn slot(&self, id: &SessionId) -> Arc<Mutex<Conversation>> {
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "Creating session");
                Arc::new(Mutex::new(Conversation::new(id.clone())))
            })
            .clone()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn acquire(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        let slot = self.slot(id);
        Ok(slot.lock_owned().await)
    }

    async fn history(&self, id: &SessionId) -> Result<Vec<Message>, SessionError> {
        let slot = match self.sessions.get(id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };
        let conversation = slot.lock().await;
        Ok(conversation.messages.clone())
    }

    async fn session_count(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.len())
    }
}
