//! Passage index adapters for ANMI.
//!
//! All adapters implement the `anmi_core::SearchIndex` trait. The Azure
//! adapter talks to the hosted index; the in-memory one serves a corpus
//! produced by a dry-run ingestion.

pub mod azure;
pub mod in_memory;

pub use azure::AzureSearchIndex;
pub use in_memory::InMemoryIndex;
