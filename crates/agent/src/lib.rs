//! Turn orchestration for ANMI.
//!
//! A turn follows a linear pipeline with one early exit:
//!
//! 1. **Retrieve** grounding passages from the index
//! 2. **Gate** on whether anything was found (refuse if not)
//! 3. **Assemble** the policy, the session history and the question
//! 4. **Generate** with the configured provider
//! 5. **Persist** the exchange in the session
//!
//! Streaming turns pass the backend's fragments through the word
//! re-segmenter on the way out.

pub mod gate;
pub mod orchestrator;
pub mod prompt;
pub mod resegment;
pub mod retriever;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use gate::{GateDecision, ScopeGate};
pub use orchestrator::{TurnError, TurnOrchestrator, TurnPhase, TurnStream};
pub use prompt::{DEFAULT_POLICY_TEMPLATE, PromptAssembler, PromptError};
pub use resegment::{Pacing, PumpOutcome, WordSegmenter, resegment, text_source};
pub use retriever::{ContextRetriever, PASSAGE_SEPARATOR, RetrievedContext};
pub use stream_event::StreamEvent;
