//! Ingestion errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// One source document could not be read; the run continues without it.
    #[error("Skipping document {path}: {reason}")]
    Document { path: PathBuf, reason: String },

    #[error("Source folder not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Invalid noise pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Invalid ingestion settings: {0}")]
    Settings(String),

    #[error("Invalid curated JSON in {path}: {reason}")]
    Json { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}
