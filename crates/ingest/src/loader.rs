//! Source loading.
//!
//! Raw documents are plain-text extractions of the official guides, one
//! `.txt` file per guide, pages separated by form feeds (as `pdftotext`
//! writes them). Curated knowledge arrives as a JSON array of
//! `{title, keywords, content}` items.

use crate::error::IngestError;
use anmi_core::passage::Passage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PAGE_BREAK: char = '\u{000C}';

/// One source document split into pages.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// File name, used as passage title and tag
    pub title: String,
    pub pages: Vec<String>,
}

impl RawDocument {
    pub fn from_text(title: impl Into<String>, text: &str) -> Self {
        Self {
            title: title.into(),
            pages: text.split(PAGE_BREAK).map(str::to_string).collect(),
        }
    }
}

/// Documents found in a folder plus the ones that could not be read.
#[derive(Debug, Default)]
pub struct LoadedCorpus {
    pub documents: Vec<RawDocument>,
    pub skipped: Vec<IngestError>,
}

/// Read every `.txt` file in `dir`, sorted by file name.
pub async fn load_folder(dir: &Path) -> Result<LoadedCorpus, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::SourceMissing(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| IngestError::Io {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| IngestError::Io {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })? {
        let path = entry.path();
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
        if is_txt && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut corpus = LoadedCorpus::default();
    for path in paths {
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match tokio::fs::read(&path).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => {
                    info!(document = %title, "Loaded document");
                    corpus.documents.push(RawDocument::from_text(title, &text));
                }
                Err(e) => {
                    let err = IngestError::Document {
                        path: path.clone(),
                        reason: format!("not valid UTF-8: {e}"),
                    };
                    warn!(error = %err, "Document skipped");
                    corpus.skipped.push(err);
                }
            },
            Err(e) => {
                let err = IngestError::Document {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "Document skipped");
                corpus.skipped.push(err);
            }
        }
    }

    Ok(corpus)
}

/// One entry of the curated knowledge base.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CuratedItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Turn curated items into passages.
///
/// Title and keywords are folded into the content so the index matches on
/// them; the item position stands in for page and chunk index.
pub fn curated_passages(items: Vec<CuratedItem>) -> Vec<Passage> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let title = item
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Documento {}", i + 1));
            let keywords = item.keywords.unwrap_or_default();
            let content = item.content.unwrap_or_default();
            let tags = if keywords.is_empty() {
                Vec::new()
            } else {
                keywords.split(", ").map(str::to_string).collect()
            };

            Passage::new(
                format!("{title}\n\nPalabras clave: {keywords}\n\n{content}"),
                title,
                i as u32 + 1,
                i,
                tags,
            )
        })
        .collect()
}

pub async fn load_curated(path: &Path) -> Result<Vec<Passage>, IngestError> {
    if !path.is_file() {
        return Err(IngestError::SourceMissing(path.to_path_buf()));
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IngestError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let items: Vec<CuratedItem> = serde_json::from_str(&raw).map_err(|e| IngestError::Json {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    info!(path = %path.display(), items = items.len(), "Loaded curated knowledge base");
    Ok(curated_passages(items))
}
