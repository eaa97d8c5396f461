//! The turn orchestrator — one user question in, one grounded answer out.
//!
//! Each turn walks a fixed pipeline:
//!
//! 1. **Retrieve** grounding passages for the question
//! 2. **Gate**: nothing retrieved means the fixed refusal, no backend call
//! 3. **Assemble** policy + history + question
//! 4. **Generate** via the configured provider (complete or streamed)
//! 5. **Persist** the question and the answer together
//!
//! The session is held exclusively from step 1 to step 5, so turns on one
//! session are applied one at a time and a failed or abandoned turn leaves
//! no trace in the history.

use crate::gate::{GateDecision, ScopeGate};
use crate::prompt::PromptAssembler;
use crate::resegment::{Pacing, PumpOutcome, resegment, text_source};
use crate::retriever::{ContextRetriever, RetrievedContext};
use crate::stream_event::StreamEvent;
use anmi_core::error::{ProviderError, SessionError};
use anmi_core::event::{DomainEvent, EventBus};
use anmi_core::index::SearchIndex;
use anmi_core::message::{Message, SessionId};
use anmi_core::provider::{Provider, ProviderRequest};
use anmi_core::session::SessionStore;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Retrieving,
    Gating,
    ShortCircuit,
    Assembling,
    Generating,
    Persisting,
    Done,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Gating => "gating",
            Self::ShortCircuit => "short_circuit",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(session_id: &SessionId, phase: TurnPhase) {
    debug!(session_id = %session_id, phase = %phase, "Turn phase");
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The backend failed; details are in the source, not the message.
    #[error("The assistant could not generate a response")]
    Generation(#[source] ProviderError),

    #[error("Session unavailable: {0}")]
    Session(#[from] SessionError),
}

/// Paced word events for one streaming turn.
pub type TurnStream = ReceiverStream<StreamEvent>;

pub struct TurnOrchestrator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    retriever: ContextRetriever,
    gate: ScopeGate,
    assembler: PromptAssembler,
    sessions: Arc<dyn SessionStore>,
    pacing: Pacing,
    event_bus: Arc<EventBus>,
}

impl TurnOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        index: Arc<dyn SearchIndex>,
        sessions: Arc<dyn SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            retriever: ContextRetriever::new(index),
            gate: ScopeGate::default(),
            assembler: PromptAssembler::default(),
            sessions,
            pacing: Pacing::default(),
            event_bus,
        }
    }

    /// Build with every tunable taken from configuration.
    pub fn from_config(
        config: &anmi_config::AppConfig,
        provider: Arc<dyn Provider>,
        index: Arc<dyn SearchIndex>,
        sessions: Arc<dyn SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> anmi_core::Result<Self> {
        let assistant = &config.assistant;
        let assembler = match &assistant.policy_template_path {
            Some(path) => PromptAssembler::from_file(Path::new(path), &assistant.disclaimer),
            None => PromptAssembler::new(
                crate::prompt::DEFAULT_POLICY_TEMPLATE,
                &assistant.disclaimer,
            ),
        }
        .map_err(|e| anmi_core::Error::Config {
            message: e.to_string(),
        })?;

        Ok(
            Self::new(provider, &config.default_model, index, sessions, event_bus)
                .with_temperature(config.default_temperature)
                .with_max_tokens(config.default_max_tokens)
                .with_top_k(config.search.top_k)
                .with_refusal(&assistant.refusal_message)
                .with_assembler(assembler)
                .with_pacing(Pacing::from_config(&config.stream)),
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.retriever = self.retriever.with_top_k(top_k);
        self
    }

    pub fn with_refusal(mut self, refusal: impl Into<String>) -> Self {
        self.gate = ScopeGate::new(refusal);
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    fn request(&self, messages: Vec<Message>, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    async fn retrieve(&self, session_id: &SessionId, user_text: &str) -> RetrievedContext {
        enter(session_id, TurnPhase::Retrieving);
        let context = self.retriever.retrieve(user_text).await;

        match &context.failure {
            Some(reason) => self.event_bus.publish(DomainEvent::RetrievalFailed {
                session_id: session_id.to_string(),
                reason: reason.clone(),
                timestamp: Utc::now(),
            }),
            None => self.event_bus.publish(DomainEvent::RetrievalCompleted {
                session_id: session_id.to_string(),
                passages: context.passages,
                empty: context.is_empty(),
                timestamp: Utc::now(),
            }),
        }
        context
    }

    fn refused(&self, session_id: &SessionId) {
        info!(session_id = %session_id, "No grounding found, refusing");
        self.event_bus.publish(DomainEvent::TurnRefused {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn failed(&self, session_id: &SessionId, error: ProviderError) -> TurnError {
        warn!(session_id = %session_id, error = %error, "Generation failed");
        self.event_bus.publish(DomainEvent::TurnFailed {
            session_id: session_id.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        TurnError::Generation(error)
    }

    /// Answer one question and record the exchange.
    pub async fn run_turn(
        &self,
        user_text: &str,
        session_id: &SessionId,
    ) -> Result<String, TurnError> {
        enter(session_id, TurnPhase::Idle);
        let mut session = self.sessions.acquire(session_id).await?;
        let pending = Message::user(user_text);

        let context = self.retrieve(session_id, user_text).await;

        enter(session_id, TurnPhase::Gating);
        let context = match self.gate.admit(context) {
            GateDecision::Refuse(refusal) => {
                enter(session_id, TurnPhase::ShortCircuit);
                enter(session_id, TurnPhase::Persisting);
                session.push_turn(pending, Message::assistant(refusal.clone()));
                self.refused(session_id);
                enter(session_id, TurnPhase::Done);
                return Ok(refusal);
            }
            GateDecision::Admit(context) => context,
        };

        enter(session_id, TurnPhase::Assembling);
        let messages = self
            .assembler
            .assemble(&context.text, &session.messages, user_text);

        enter(session_id, TurnPhase::Generating);
        let response = self
            .provider
            .complete(self.request(messages, false))
            .await
            .map_err(|e| self.failed(session_id, e))?;

        enter(session_id, TurnPhase::Persisting);
        let answer = response.message.content.clone();
        session.push_turn(pending, response.message);

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            session_id: session_id.to_string(),
            model: response.model,
            tokens_used: response.usage.map(|u| u.total_tokens),
            streamed: false,
            timestamp: Utc::now(),
        });
        info!(session_id = %session_id, chars = answer.len(), "Turn completed");
        enter(session_id, TurnPhase::Done);

        Ok(answer)
    }

    /// Answer one question as a paced word stream.
    ///
    /// Errors raised before the first word (session, backend refusing the
    /// request) are returned directly. Later backend failures end the stream
    /// with `StreamEvent::Error`. The exchange is recorded just before `Done`
    /// is sent; a stream dropped before that records nothing.
    pub async fn run_turn_stream(
        &self,
        user_text: &str,
        session_id: &SessionId,
    ) -> Result<TurnStream, TurnError> {
        enter(session_id, TurnPhase::Idle);
        let mut session = self.sessions.acquire(session_id).await?;
        let pending = Message::user(user_text);

        let context = self.retrieve(session_id, user_text).await;

        let sid = session_id.clone();

        enter(session_id, TurnPhase::Gating);
        let context = match self.gate.admit(context) {
            GateDecision::Refuse(refusal) => {
                enter(session_id, TurnPhase::ShortCircuit);
                enter(session_id, TurnPhase::Persisting);
                session.push_turn(pending, Message::assistant(refusal.clone()));
                drop(session);
                self.refused(session_id);

                return Ok(resegment(
                    text_source(refusal),
                    self.pacing,
                    move |_| enter(&sid, TurnPhase::Done),
                ));
            }
            GateDecision::Admit(context) => context,
        };

        enter(session_id, TurnPhase::Assembling);
        let messages = self
            .assembler
            .assemble(&context.text, &session.messages, user_text);

        enter(session_id, TurnPhase::Generating);
        let source = self
            .provider
            .stream(self.request(messages, true))
            .await
            .map_err(|e| self.failed(session_id, e))?;

        let event_bus = self.event_bus.clone();
        let model = self.model.clone();

        Ok(resegment(source, self.pacing, move |outcome| match outcome {
            PumpOutcome::Completed { text, usage } => {
                enter(&sid, TurnPhase::Persisting);
                session.push_turn(pending, Message::assistant(text.clone()));
                drop(session);

                event_bus.publish(DomainEvent::ResponseGenerated {
                    session_id: sid.to_string(),
                    model,
                    tokens_used: usage.as_ref().map(|u| u.total_tokens),
                    streamed: true,
                    timestamp: Utc::now(),
                });
                info!(session_id = %sid, chars = text.len(), "Streaming turn completed");
                enter(&sid, TurnPhase::Done);
            }
            PumpOutcome::Cancelled => {
                info!(session_id = %sid, "Stream abandoned by client, turn discarded");
            }
            PumpOutcome::Failed(error) => {
                warn!(session_id = %sid, error = %error, "Generation failed mid-stream");
                event_bus.publish(DomainEvent::TurnFailed {
                    session_id: sid.to_string(),
                    error_message: error.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }))
    }
}
