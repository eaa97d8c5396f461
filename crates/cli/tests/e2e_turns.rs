//! End-to-end tests for the ANMI turn pipeline.
//!
//! These wire the real index, session store and orchestrator together with a
//! scripted provider, from ingested documents to the answers users see.

use std::sync::{Arc, Mutex};

use anmi_agent::{StreamEvent, TurnOrchestrator};
use anmi_config::{AppConfig, DEFAULT_DISCLAIMER, DEFAULT_REFUSAL, IngestConfig};
use anmi_core::error::ProviderError;
use anmi_core::event::{DomainEvent, EventBus};
use anmi_core::message::{Message, Role, SessionId};
use anmi_core::passage::Passage;
use anmi_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use anmi_core::session::SessionStore;
use anmi_index::InMemoryIndex;
use anmi_memory::InMemorySessionStore;
use futures::StreamExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Answers from a script and records every request it receives.
struct ScriptedProvider {
    answers: Mutex<Vec<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            panic!("ScriptedProvider exhausted");
        }
        Ok(ProviderResponse {
            message: Message::assistant(answers.remove(0)),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

fn recipe_passage() -> Passage {
    Passage::new(
        "Papilla de hígado de pollo: sancochar 2 cucharadas de hígado y aplastar con zapallo.",
        "recetario.txt",
        4,
        12,
        vec!["recetario.txt".into()],
    )
}

struct Harness {
    orchestrator: TurnOrchestrator,
    provider: Arc<ScriptedProvider>,
    sessions: Arc<InMemorySessionStore>,
    bus: Arc<EventBus>,
}

fn harness(index: InMemoryIndex, answers: &[&str]) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(answers));
    let sessions = Arc::new(InMemorySessionStore::new());
    let bus = Arc::new(EventBus::default());
    let mut config = AppConfig::default();
    config.stream.min_delay_ms = 0;
    config.stream.max_delay_ms = 0;

    let orchestrator = TurnOrchestrator::from_config(
        &config,
        provider.clone(),
        Arc::new(index),
        sessions.clone(),
        bus.clone(),
    )
    .unwrap();

    Harness {
        orchestrator,
        provider,
        sessions,
        bus,
    }
}

// ── Scenario A: nothing retrieved ────────────────────────────────────────

#[tokio::test]
async fn e2e_out_of_scope_question_is_refused_without_backend_call() {
    let h = harness(InMemoryIndex::new(), &[]);
    let mut events = h.bus.subscribe();
    let sid = SessionId::from("madre-1");

    let answer = h.orchestrator.run_turn("¿Qué es la anemia?", &sid).await.unwrap();

    assert_eq!(answer, DEFAULT_REFUSAL);
    assert!(!answer.contains(DEFAULT_DISCLAIMER));
    assert!(h.provider.requests().is_empty());

    let history = h.sessions.history(&sid).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, DEFAULT_REFUSAL);

    let first = events.recv().await.unwrap();
    assert!(matches!(*first, DomainEvent::RetrievalCompleted { empty: true, .. }));
    let second = events.recv().await.unwrap();
    assert!(matches!(*second, DomainEvent::TurnRefused { .. }));
}

// ── Scenario B: grounded recipe answer ───────────────────────────────────

#[tokio::test]
async fn e2e_recipe_question_is_grounded_in_the_passage() {
    let reply = format!(
        "**Papilla de hígado de pollo**\n1. Sancochar 2 cucharadas de hígado.\n2. Aplastar con zapallo.\n\n{DEFAULT_DISCLAIMER}"
    );
    let h = harness(InMemoryIndex::with_passages(vec![recipe_passage()]), &[&reply]);
    let sid = SessionId::from("madre-2");

    let answer = h
        .orchestrator
        .run_turn("Dame una receta con hígado de pollo", &sid)
        .await
        .unwrap();

    assert!(answer.contains("hígado"));
    assert!(answer.contains("2 cucharadas"));
    assert!(answer.trim_end().ends_with(DEFAULT_DISCLAIMER));

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    let system = &requests[0].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("sancochar 2 cucharadas de hígado"));
    assert!(system.content.contains(DEFAULT_DISCLAIMER));
    assert!(system.content.contains("Dame una receta con hígado de pollo"));
}

// ── Scenario C: follow-up sees the earlier exchange ──────────────────────

#[tokio::test]
async fn e2e_second_turn_carries_first_exchange_in_order() {
    let h = harness(
        InMemoryIndex::with_passages(vec![recipe_passage()]),
        &["Primera respuesta sobre hígado.", "Sí, desde los 6 meses."],
    );
    let sid = SessionId::from("madre-3");

    h.orchestrator
        .run_turn("¿Cómo preparo hígado de pollo?", &sid)
        .await
        .unwrap();
    h.orchestrator
        .run_turn("¿Y el hígado se da desde los 6 meses?", &sid)
        .await
        .unwrap();

    let second = &h.provider.requests()[1].messages;
    let roles: Vec<Role> = second.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    assert_eq!(second[1].content, "¿Cómo preparo hígado de pollo?");
    assert_eq!(second[2].content, "Primera respuesta sobre hígado.");
    assert_eq!(second[3].content, "¿Y el hígado se da desde los 6 meses?");

    assert_eq!(h.sessions.history(&sid).await.unwrap().len(), 4);
}

// ── Streaming ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_streamed_answer_reassembles_and_is_recorded() {
    let reply = "Ofrece **sangrecita** con papa amarilla dos veces por semana.";
    let h = harness(InMemoryIndex::with_passages(vec![recipe_passage()]), &[reply]);
    let sid = SessionId::from("madre-4");

    let stream = h
        .orchestrator
        .run_turn_stream("¿Qué hago con el hígado?", &sid)
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.collect().await;

    assert_eq!(events.last(), Some(&StreamEvent::Done));
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Word { token } => Some(token.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, reply);

    let history = h.sessions.history(&sid).await.unwrap();
    assert_eq!(history.last().map(|m| m.content.as_str()), Some(reply));
}

// ── Ingest → local corpus → answer ───────────────────────────────────────

#[tokio::test]
async fn e2e_dry_run_corpus_grounds_a_chat_turn() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("data");
    std::fs::create_dir(&source).unwrap();
    std::fs::write(
        source.join("recetario.txt"),
        "ISBN: 978-612-000-00-0 Hecho el Depósito Legal en la Biblioteca Nacional del Perú\u{000C}\
         Mazamorra de quinua con manzana: hervir la quinua lavada con canela, agregar la manzana \
         picada y servir tibia a niñas y niños desde los ocho meses.",
    )
    .unwrap();

    let config = IngestConfig {
        chunk_size: 400,
        chunk_overlap: 40,
        min_chars: 40,
        ..IngestConfig::default()
    };
    let report = anmi_ingest::ingest_folder(&source, &config).await.unwrap();
    assert_eq!(report.passages.len(), 1);
    assert_eq!(report.stats.discard_marker, 1);

    let corpus = dir.path().join("output_chunks.json");
    anmi_ingest::write_dry_run(&report.passages, &corpus).await.unwrap();
    let index = InMemoryIndex::load_json(&corpus).await.unwrap();

    let h = harness(index, &["Receta de mazamorra de quinua."]);
    let sid = SessionId::from("madre-5");
    h.orchestrator
        .run_turn("Receta de mazamorra de quinua", &sid)
        .await
        .unwrap();

    let system = &h.provider.requests()[0].messages[0].content;
    assert!(system.contains("Mazamorra de quinua con manzana"));
    assert!(!system.contains("ISBN"));
}
