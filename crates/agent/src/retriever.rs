//! Context retrieval — fetch grounding text for a user question.
//!
//! Retrieval never fails a turn. An unreachable index, a malformed response,
//! or a search with no usable hits all produce the empty context, which the
//! scope gate turns into the refusal.

use anmi_core::index::{SearchIndex, SearchRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// Separator placed between passage contents.
pub const PASSAGE_SEPARATOR: &str = "\n---\n";

/// Grounding text for one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    /// Passage contents joined with [`PASSAGE_SEPARATOR`]
    pub text: String,

    /// Number of passages that contributed text
    pub passages: usize,

    /// Why the index could not be queried, when it could not
    pub failure: Option<String>,
}

impl RetrievedContext {
    /// The not-found sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.passages == 0 || self.text.trim().is_empty()
    }
}

pub struct ContextRetriever {
    index: Arc<dyn SearchIndex>,
    top_k: usize,
}

impl ContextRetriever {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index, top_k: 3 }
    }

    /// Set how many passages are requested per turn.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub async fn retrieve(&self, query: &str) -> RetrievedContext {
        let request = SearchRequest::content(query, self.top_k);

        let hits = match self.index.search(request).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(index = %self.index.name(), error = %e, "Retrieval failed, continuing without context");
                return RetrievedContext {
                    failure: Some(e.to_string()),
                    ..RetrievedContext::empty()
                };
            }
        };

        let contents: Vec<&str> = hits
            .iter()
            .map(|h| h.content.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect();

        debug!(hits = hits.len(), usable = contents.len(), "Retrieval completed");

        RetrievedContext {
            text: contents.join(PASSAGE_SEPARATOR),
            passages: contents.len(),
            failure: None,
        }
    }
}
