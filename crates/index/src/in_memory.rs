//! In-memory index — keyword search over a local passage corpus.
//!
//! Useful for testing and for chatting against the output of a dry-run
//! ingestion without a hosted index.

use anmi_core::error::IndexError;
use anmi_core::index::{SearchHit, SearchIndex, SearchRequest, UploadSummary};
use anmi_core::passage::Passage;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

/// Query terms shorter than this are ignored (articles, prepositions).
const MIN_TERM_LEN: usize = 3;

pub struct InMemoryIndex {
    passages: RwLock<Vec<Passage>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            passages: RwLock::new(Vec::new()),
        }
    }

    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages: RwLock::new(passages),
        }
    }

    /// Load the JSON array written by a dry-run ingestion.
    pub async fn load_json(path: &Path) -> Result<Self, IndexError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            IndexError::NotConfigured(format!("cannot read corpus {}: {e}", path.display()))
        })?;
        let passages: Vec<Passage> = serde_json::from_str(&raw)
            .map_err(|e| IndexError::InvalidResponse(format!("corpus {}: {e}", path.display())))?;

        info!(path = %path.display(), passages = passages.len(), "Loaded local corpus");
        Ok(Self::with_passages(passages))
    }

    pub async fn len(&self) -> usize {
        self.passages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.passages.read().await.is_empty()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn query_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Keyword relevance: term occurrences normalized by passage length.
fn score(content: &str, terms: &[String]) -> f32 {
    let lower = content.to_lowercase();
    let occurrences: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
    occurrences as f32 / (content.len() as f32 / 100.0).max(1.0)
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>, IndexError> {
        let terms = query_terms(&request.text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let passages = self.passages.read().await;
        let mut scored: Vec<(f32, &Passage)> = passages
            .iter()
            .map(|p| (score(&p.content, &terms), p))
            .filter(|(s, _)| *s > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(request.top);

        Ok(scored
            .into_iter()
            .map(|(_, p)| SearchHit {
                content: p.content.clone(),
            })
            .collect())
    }

    async fn upload(&self, passages: &[Passage]) -> Result<UploadSummary, IndexError> {
        self.passages.write().await.extend_from_slice(passages);
        Ok(UploadSummary {
            succeeded: passages.len(),
            total: passages.len(),
        })
    }
}
