//! SearchIndex trait — the abstraction over the external passage index.
//!
//! The index ranks passages for a free-text query and accepts uploads from
//! ingestion. Ranking quality and query execution belong to the backend.

use crate::error::IndexError;
use crate::passage::Passage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A ranked search over the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub text: String,

    /// Fields to return for each hit
    #[serde(default = "default_select")]
    pub select: Vec<String>,

    /// Maximum number of hits
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_select() -> Vec<String> {
    vec!["content".into()]
}

fn default_top() -> usize {
    3
}

impl SearchRequest {
    /// A content-only query returning at most `top` hits.
    pub fn content(text: impl Into<String>, top: usize) -> Self {
        Self {
            text: text.into(),
            select: default_select(),
            top,
        }
    }
}

/// One ranked item returned by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub content: String,
}

/// Outcome of uploading one batch of passages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Items the index accepted
    pub succeeded: usize,

    /// Items in the batch
    pub total: usize,
}

impl UploadSummary {
    pub fn failed(&self) -> usize {
        self.total.saturating_sub(self.succeeded)
    }
}

/// The core SearchIndex trait.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// The backend name (e.g., "azure_search", "in_memory").
    fn name(&self) -> &str;

    /// Return the top-ranked hits for a query, best first.
    async fn search(&self, request: SearchRequest) -> std::result::Result<Vec<SearchHit>, IndexError>;

    /// Upload one batch of passages.
    async fn upload(&self, passages: &[Passage]) -> std::result::Result<UploadSummary, IndexError>;
}
