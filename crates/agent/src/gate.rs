//! Scope gate — the only out-of-scope detector.
//!
//! Anything the index cannot ground is refused with a fixed apology and
//! never reaches the generative backend.

use crate::retriever::RetrievedContext;

/// What the gate decided for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Proceed to generation with this context.
    Admit(RetrievedContext),

    /// Answer with this text instead of generating.
    Refuse(String),
}

pub struct ScopeGate {
    refusal: String,
}

impl ScopeGate {
    pub fn new(refusal: impl Into<String>) -> Self {
        Self {
            refusal: refusal.into(),
        }
    }

    pub fn refusal(&self) -> &str {
        &self.refusal
    }

    pub fn admit(&self, context: RetrievedContext) -> GateDecision {
        if context.is_empty() {
            GateDecision::Refuse(self.refusal.clone())
        } else {
            GateDecision::Admit(context)
        }
    }
}

impl Default for ScopeGate {
    fn default() -> Self {
        Self::new(anmi_config::DEFAULT_REFUSAL)
    }
}
