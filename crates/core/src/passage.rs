//! Passage — the unit of indexed knowledge.
//!
//! Passages are produced by ingestion, uploaded once, and afterwards owned by
//! the external index. The serialized field names are the index schema.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cleaned, bounded unit of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Freshly generated unique ID
    pub id: String,

    /// Cleaned text content
    pub content: String,

    /// Source document title (file name for raw documents)
    pub title: String,

    /// 1-based page number the window came from
    pub page: u32,

    /// Window index within the source document
    pub chunk_index: usize,

    /// Tags; always contains the source title for raw documents
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Passage {
    /// Build a passage with a fresh id.
    pub fn new(
        content: impl Into<String>,
        title: impl Into<String>,
        page: u32,
        chunk_index: usize,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            title: title.into(),
            page,
            chunk_index,
            tags,
        }
    }
}
