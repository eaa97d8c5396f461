//! Domain event system — decoupled observation of the turn pipeline.
//!
//! Events are published when something interesting happens during a turn.
//! Observers (logging sinks, dashboards, tests) subscribe without coupling
//! to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Retrieval finished (possibly with nothing found)
    RetrievalCompleted {
        session_id: String,
        passages: usize,
        empty: bool,
        timestamp: DateTime<Utc>,
    },

    /// The index adapter failed; the turn continues with an empty context
    RetrievalFailed {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The scope gate returned the canned refusal
    TurnRefused {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The generative backend produced an answer that was persisted
    ResponseGenerated {
        session_id: String,
        model: String,
        tokens_used: Option<u32>,
        streamed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Generation failed; nothing was appended to the session
    TurnFailed {
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
