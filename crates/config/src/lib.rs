//! Configuration loading, validation, and management for ANMI.
//!
//! Loads configuration from `~/.anmi/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.anmi/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generative backend (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generative provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Passage index connection and retrieval settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Policy template and canned texts
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Word streaming cadence
    #[serde(default)]
    pub stream: StreamConfig,

    /// Corpus ingestion and cleaning
    #[serde(default)]
    pub ingest: IngestConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2048
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("search", &self.search)
            .field("assistant", &self.assistant)
            .field("stream", &self.stream)
            .field("ingest", &self.ingest)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Connection to the passage index (Azure AI Search compatible).
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Service name; the endpoint becomes `https://{service}.search.windows.net`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Full endpoint URL, takes precedence over `service_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Passages retrieved per turn
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    "2023-11-01".into()
}
fn default_top_k() -> usize {
    3
}
fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            service_name: None,
            endpoint: None,
            index_name: None,
            api_key: None,
            api_version: default_api_version(),
            top_k: default_top_k(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("service_name", &self.service_name)
            .field("endpoint", &self.endpoint)
            .field("index_name", &self.index_name)
            .field("api_key", &redact(&self.api_key))
            .field("api_version", &self.api_version)
            .field("top_k", &self.top_k)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Everything needed to talk to the index, after validation.
#[derive(Clone)]
pub struct ResolvedSearch {
    pub endpoint: String,
    pub index_name: String,
    pub api_key: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Replace the built-in policy template with the contents of this file.
    /// The file must contain the `{context}` and `{question}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_template_path: Option<String>,

    /// Fixed text returned when retrieval finds nothing
    #[serde(default = "default_refusal")]
    pub refusal_message: String,

    /// Closing sentence the policy asks every grounded answer to end with
    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
}

pub const DEFAULT_REFUSAL: &str =
    "Lo siento, no tengo esa receta o información específica en mis guías oficiales.";

pub const DEFAULT_DISCLAIMER: &str = "*Importante: Estas son recomendaciones generales de guías oficiales. No reemplazan la consulta con tu pediatra.*";

fn default_refusal() -> String {
    DEFAULT_REFUSAL.into()
}
fn default_disclaimer() -> String {
    DEFAULT_DISCLAIMER.into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            policy_template_path: None,
            refusal_message: default_refusal(),
            disclaimer: default_disclaimer(),
        }
    }
}

/// Pacing of word-by-word streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_min_delay() -> u64 {
    10
}
fn default_max_delay() -> u64 {
    40
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

/// Corpus ingestion settings.
///
/// The marker lists are data, not logic: extend them here (or in
/// `config.toml`) as new noise shows up in the source documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Folder holding the extracted `.txt` documents
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive windows
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Minimum cleaned length for a window to survive
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Minimum share of alphabetic characters among non-whitespace ones
    #[serde(default = "default_min_alpha_ratio")]
    pub min_alpha_ratio: f32,

    /// Regular expressions removed from every window
    #[serde(default = "default_noise_patterns")]
    pub noise_patterns: Vec<String>,

    /// Case-insensitive markers of administrative boilerplate
    #[serde(default = "default_discard_markers")]
    pub discard_markers: Vec<String>,

    /// Case-insensitive markers of dosage/quantity tables
    #[serde(default = "default_table_markers")]
    pub table_markers: Vec<String>,

    /// Passages per upload request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Dry-run output for raw document ingestion
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Dry-run output for curated JSON ingestion
    #[serde(default = "default_json_output_file")]
    pub json_output_file: String,
}

fn default_source_dir() -> String {
    "data".into()
}
fn default_chunk_size() -> usize {
    1500
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_min_chars() -> usize {
    80
}
fn default_min_alpha_ratio() -> f32 {
    0.5
}
fn default_batch_size() -> usize {
    500
}
fn default_output_file() -> String {
    "output_chunks.json".into()
}
fn default_json_output_file() -> String {
    "output_json_preview.json".into()
}

pub fn default_noise_patterns() -> Vec<String> {
    vec![
        // bare page numbers on their own line: "12", "- 12 -"
        r"(?m)^\s*-?\s*\d{1,4}\s*-?\s*$".into(),
        // "Página 3", "Pág. 3 de 40"
        r"(?i)p[áa]g(?:ina|\.)?\s*\d+(?:\s+de\s+\d+)?".into(),
        // running header of the official guides
        r"(?i)ministerio\s+de\s+salud\s*[-–|]\s*instituto\s+nacional\s+de\s+salud".into(),
        // dotted leaders from tables of contents
        r"[_.·•…]{4,}".into(),
        // OCR replacement characters
        r"\x{FFFD}+".into(),
    ]
}

pub fn default_discard_markers() -> Vec<String> {
    [
        // credits page
        "ISBN:",
        "Hecho el Depósito Legal",
        "Catalogación hecha por",
        "Impreso por:",
        "www.ins.gob.pe",
        // resolution page
        "SE RESUELVE",
        "Regístrese, comuníquese y publíquese",
        "Con el visado del",
        // team pages
        "EQUIPO TÉCNICO RESPONSABLE",
        "PARTICIPARON EN LA REVISIÓN",
        "Colegio de Nutricionistas del Perú",
        // bibliography
        "Referencias bibliográficas",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn default_table_markers() -> Vec<String> {
    [
        "dosis",
        "cantidad",
        "porción",
        "cucharada",
        "gramos",
        "miligramos",
        "mg/kg",
        "frecuencia",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chars: default_min_chars(),
            min_alpha_ratio: default_min_alpha_ratio(),
            noise_patterns: default_noise_patterns(),
            discard_markers: default_discard_markers(),
            table_markers: default_table_markers(),
            batch_size: default_batch_size(),
            output_file: default_output_file(),
            json_output_file: default_json_output_file(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.anmi/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ANMI_API_KEY`, then `GEMINI_API_KEY`, then `OPENAI_API_KEY`
    /// - `ANMI_PROVIDER`, `ANMI_MODEL`
    /// - `AZURE_SEARCH_SERVICE_NAME`, `AZURE_SEARCH_INDEX_NAME`, `AZURE_SEARCH_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load from an explicit file (or the default path) and apply the environment.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(path.unwrap_or(&default_path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("ANMI_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("ANMI_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("ANMI_MODEL") {
            self.default_model = model;
        }

        if let Some(service) = lookup("AZURE_SEARCH_SERVICE_NAME") {
            self.search.service_name = Some(service);
        }
        if let Some(index) = lookup("AZURE_SEARCH_INDEX_NAME") {
            self.search.index_name = Some(index);
        }
        if let Some(key) = lookup("AZURE_SEARCH_API_KEY") {
            self.search.api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".anmi")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.search.top_k == 0 {
            return Err(ConfigError::ValidationError("search.top_k must be > 0".into()));
        }

        if self.stream.min_delay_ms > self.stream.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "stream.min_delay_ms must not exceed stream.max_delay_ms".into(),
            ));
        }

        let ingest = &self.ingest;
        if ingest.chunk_size == 0 || ingest.chunk_overlap >= ingest.chunk_size {
            return Err(ConfigError::ValidationError(
                "ingest.chunk_overlap must be smaller than a non-zero ingest.chunk_size".into(),
            ));
        }
        if !(0.0..=1.0).contains(&ingest.min_alpha_ratio) {
            return Err(ConfigError::ValidationError(
                "ingest.min_alpha_ratio must be between 0.0 and 1.0".into(),
            ));
        }
        if ingest.batch_size == 0 {
            return Err(ConfigError::ValidationError("ingest.batch_size must be > 0".into()));
        }

        Ok(())
    }

    /// The generative backend key, or the variable to set.
    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("ANMI_API_KEY (or GEMINI_API_KEY / OPENAI_API_KEY)"))
    }

    /// Index connection details, or the first variable that is missing.
    pub fn require_search(&self) -> Result<ResolvedSearch, ConfigError> {
        let endpoint = match (&self.search.endpoint, &self.search.service_name) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(service)) => format!("https://{service}.search.windows.net"),
            (None, None) => return Err(ConfigError::Missing("AZURE_SEARCH_SERVICE_NAME")),
        };
        let index_name = self
            .search
            .index_name
            .clone()
            .ok_or(ConfigError::Missing("AZURE_SEARCH_INDEX_NAME"))?;
        let api_key = self
            .search
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("AZURE_SEARCH_API_KEY"))?;

        Ok(ResolvedSearch {
            endpoint,
            index_name,
            api_key,
            api_version: self.search.api_version.clone(),
            timeout_secs: self.search.timeout_secs,
        })
    }

    /// Generate a default config TOML string (for `anmi config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            search: SearchConfig::default(),
            assistant: AssistantConfig::default(),
            stream: StreamConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}
