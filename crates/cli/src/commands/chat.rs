//! `anmi chat` — Single-message or interactive chat.

use anmi_agent::{StreamEvent, TurnOrchestrator};
use anmi_config::AppConfig;
use anmi_core::event::EventBus;
use anmi_core::index::SearchIndex;
use anmi_core::message::SessionId;
use anmi_index::{AzureSearchIndex, InMemoryIndex};
use anmi_memory::InMemorySessionStore;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct ChatOptions {
    pub message: Option<String>,
    pub session: Option<String>,
    pub stream: bool,
    pub corpus: Option<PathBuf>,
}

/// Providers that run locally and need no key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp"];

pub async fn run(
    config_path: Option<&Path>,
    options: ChatOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    if !KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        if let Err(e) = config.require_api_key() {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set ANMI_API_KEY (or GEMINI_API_KEY) or add `api_key` to:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err(e.into());
        }
    }

    let index = build_index(&config, options.corpus.as_deref()).await?;

    let router = anmi_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;

    let event_bus = Arc::new(EventBus::default());
    let sessions = Arc::new(InMemorySessionStore::new());
    let orchestrator = TurnOrchestrator::from_config(&config, provider, index, sessions, event_bus)?;

    let session_id = options
        .session
        .as_deref()
        .map(SessionId::from)
        .unwrap_or_default();

    if let Some(msg) = options.message {
        answer(&orchestrator, &msg, &session_id, options.stream).await?;
        return Ok(());
    }

    println!();
    println!("  ANMI — Asistente Nutricional Materno Infantil");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    match &options.corpus {
        Some(path) => println!("  Corpus:    {}", path.display()),
        None => println!("  Index:     {}", config.search.index_name.as_deref().unwrap_or("-")),
    }
    println!("  Session:   {session_id}");
    println!();
    println!("  Escribe tu pregunta y presiona Enter. 'salir' para terminar.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  Tú > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "salir" | "exit" | "quit") {
            break;
        }

        print!("  ANMI > ");
        std::io::stdout().flush()?;
        if let Err(e) = answer(&orchestrator, line, &session_id, options.stream).await {
            eprintln!("  Error: {e}");
        }
        println!();
    }

    Ok(())
}

async fn build_index(
    config: &AppConfig,
    corpus: Option<&Path>,
) -> anmi_core::Result<Arc<dyn SearchIndex>> {
    if let Some(path) = corpus {
        let index = InMemoryIndex::load_json(path).await?;
        tracing::info!(passages = index.len().await, path = %path.display(), "Using local corpus");
        return Ok(Arc::new(index));
    }

    let search = config
        .require_search()
        .map_err(|e| anmi_core::Error::Config {
            message: e.to_string(),
        })?;
    Ok(Arc::new(AzureSearchIndex::from_config(&search)))
}

async fn answer(
    orchestrator: &TurnOrchestrator,
    question: &str,
    session_id: &SessionId,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !stream {
        let text = orchestrator.run_turn(question, session_id).await?;
        println!("{text}");
        return Ok(());
    }

    let mut events = orchestrator.run_turn_stream(question, session_id).await?;
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Word { token } => {
                write!(stdout, "{token}")?;
                stdout.flush()?;
            }
            StreamEvent::Done => {
                writeln!(stdout)?;
                break;
            }
            StreamEvent::Error { message } => {
                writeln!(stdout)?;
                return Err(message.into());
            }
        }
    }
    Ok(())
}
