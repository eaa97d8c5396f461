//! # ANMI Core
//!
//! Domain types, traits, and error definitions for the ANMI grounded
//! nutrition assistant. This crate has **no framework dependencies**: it
//! defines the domain model that every other crate implements against.
//!
//! ## Seams
//!
//! The two external collaborators of the turn pipeline are traits here:
//! - [`Provider`] is the generative backend (single-shot and streaming)
//! - [`SearchIndex`] is the passage index queried before every generation
//!
//! Conversation memory is the [`SessionStore`] trait. Implementations live in
//! their respective crates so tests can swap in scripted stand-ins.

pub mod error;
pub mod event;
pub mod index;
pub mod message;
pub mod passage;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, IndexError, ProviderError, Result, SessionError};
pub use event::{DomainEvent, EventBus};
pub use index::{SearchHit, SearchIndex, SearchRequest, UploadSummary};
pub use message::{Conversation, Message, Role, SessionId};
pub use passage::Passage;
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use session::{SessionHandle, SessionStore};
