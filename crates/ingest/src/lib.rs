//! Corpus ingestion for ANMI.
//!
//! Official guides are loaded page by page, cut into overlapping windows,
//! cleaned and filtered, then uploaded to the passage index in batches.
//! A curated JSON knowledge base can be uploaded through the same path.

pub mod error;
pub mod loader;
pub mod normalizer;
pub mod pipeline;

pub use error::IngestError;
pub use loader::{CuratedItem, LoadedCorpus, RawDocument, curated_passages, load_curated, load_folder};
pub use normalizer::{NormalizeStats, Normalizer, Verdict, alpha_ratio, windows};
pub use pipeline::{
    BatchReport, IngestReport, ingest_curated, ingest_folder, upload_batches, write_dry_run,
};
