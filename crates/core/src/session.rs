//! SessionStore trait — per-session conversation memory.
//!
//! A store maps session keys to append-only conversations. Callers take an
//! exclusive handle on one session for the duration of a turn; handles on
//! different keys never contend.

use crate::error::SessionError;
use crate::message::{Conversation, Message, SessionId};
use async_trait::async_trait;

/// Exclusive access to one session's conversation.
///
/// Owned so that a streaming turn can carry it into a spawned task.
/// Dropping the handle releases the session.
pub type SessionHandle = tokio::sync::OwnedMutexGuard<Conversation>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Lock a session, creating it empty on first use of the key.
    ///
    /// Waits while another turn holds the same session.
    async fn acquire(&self, id: &SessionId) -> std::result::Result<SessionHandle, SessionError>;

    /// Snapshot of a session's messages; empty for unknown keys.
    async fn history(&self, id: &SessionId) -> std::result::Result<Vec<Message>, SessionError>;

    /// Number of sessions created so far.
    async fn session_count(&self) -> std::result::Result<usize, SessionError>;
}
