//! Turn-level streaming events.
//!
//! `StreamEvent` is what a streaming turn yields: paced word units, then a
//! single end marker (or a generic error). `to_sse_frame` renders the
//! transport framing used by the chat surface.

use serde::{Deserialize, Serialize};

/// Message carried by `StreamEvent::Error`. Backend details stay in the logs.
pub const GENERIC_STREAM_ERROR: &str = "The assistant could not complete the response.";

/// Events emitted during a streaming turn.
///
/// - `word`  — one word unit (non-space run plus its trailing space, or the final remainder)
/// - `done`  — the answer is complete and the turn has been recorded
/// - `error` — generation failed; nothing was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Word { token: String },
    Done,
    Error { message: String },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Word { .. } => "word",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Render as a `data:` frame terminated by a blank line.
    pub fn to_sse_frame(&self) -> String {
        match self {
            Self::Word { token } => {
                format!("data: {}\n\n", serde_json::json!({ "token": token }))
            }
            Self::Done => "data: [DONE]\n\n".to_string(),
            Self::Error { message } => {
                format!("data: {}\n\n", serde_json::json!({ "error": message }))
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Word { .. })
    }
}
