//! OpenAI-compatible provider implementation.
//!
//! Works with: Gemini (through its OpenAI endpoint), OpenAI, OpenRouter,
//! Ollama, vLLM, and any OpenAI-compatible `/chat/completions` endpoint.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Health checks

use anmi_core::error::ProviderError;
use anmi_core::message::{Message, Role};
use anmi_core::provider::*;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create a Gemini provider using Google's OpenAI-compatible endpoint.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key,
        )
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    /// Map non-success HTTP statuses onto provider errors.
    async fn check_status(
        response: reqwest::Response,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl anmi_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let response = Self::check_status(response).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let usage = api_response.usage.map(Usage::from);

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let response = Self::check_status(response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in decoder.feed(&bytes) {
                    if !forward(&tx, line, &provider_name).await {
                        return;
                    }
                }
            }

            if let Some(line) = decoder.flush() {
                if !forward(&tx, line, &provider_name).await {
                    return;
                }
            }

            // Body ended without [DONE]: only a stream the model finished counts
            let end = if decoder.finished {
                Ok(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                })
            } else {
                warn!(provider = %provider_name, "Stream closed before the model finished");
                Err(ProviderError::StreamInterrupted(
                    "response ended before the model finished".into(),
                ))
            };
            let _ = tx.send(end).await;
        });

        Ok(rx)
    }
}

type ChunkSender = tokio::sync::mpsc::Sender<std::result::Result<StreamChunk, ProviderError>>;

/// Pass one decoded line to the receiver. `false` ends the reader task.
async fn forward(tx: &ChunkSender, line: SseLine, provider: &str) -> bool {
    match line {
        SseLine::Skip => true,
        SseLine::Done => {
            let _ = tx
                .send(Ok(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                }))
                .await;
            false
        }
        SseLine::Chunk { chunk, .. } => {
            let last = chunk.done;
            tx.send(Ok(chunk)).await.is_ok() && !last
        }
        SseLine::Error(e) => {
            warn!(provider = %provider, error = %e, "Provider reported an error mid-stream");
            let _ = tx.send(Err(e)).await;
            false
        }
        SseLine::Unparseable(data) => {
            trace!(provider = %provider, data = %data, "Ignoring unparseable SSE chunk");
            true
        }
    }
}

/// Incremental SSE reader over raw body bytes.
///
/// Lines are split on `\n` before decoding, so a multi-byte character cut
/// across network chunks is reassembled intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    /// A choice carried a `finish_reason`
    finished: bool,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(self.decode(&raw[..pos]));
        }
        lines
    }

    /// Decode a trailing line that arrived without a newline.
    fn flush(&mut self) -> Option<SseLine> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(self.decode(&raw))
    }

    fn decode(&mut self, raw: &[u8]) -> SseLine {
        let line = String::from_utf8_lossy(raw);
        let parsed = parse_sse_line(line.trim_end_matches('\r'));
        if let SseLine::Chunk { finish: true, .. } = parsed {
            self.finished = true;
        }
        parsed
    }
}

/// One classified line of an SSE body.
#[derive(Debug)]
enum SseLine {
    Skip,
    Done,
    Chunk { chunk: StreamChunk, finish: bool },
    Error(ProviderError),
    Unparseable(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let stream_resp = match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => resp,
        Err(_) => return SseLine::Unparseable(data.to_string()),
    };

    if let Some(error) = stream_resp.error {
        return SseLine::Error(error.into());
    }

    // Usage arrives in the final chunk when stream_options asks for it
    if let Some(usage) = stream_resp.usage {
        let content = stream_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty());
        return SseLine::Chunk {
            chunk: StreamChunk {
                content,
                done: true,
                usage: Some(usage.into()),
            },
            finish: true,
        };
    }

    match stream_resp.choices.into_iter().next() {
        Some(choice) => {
            let content = choice.delta.content.filter(|c| !c.is_empty());
            let finish = choice.finish_reason.is_some();
            if content.is_none() && !finish {
                return SseLine::Skip;
            }
            SseLine::Chunk {
                chunk: StreamChunk {
                    content,
                    done: false,
                    usage: None,
                },
                finish,
            }
        }
        None => SseLine::Skip,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

/// `{"error": {...}}` sent in place of a delta when generation fails.
#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: Option<String>,
    /// Numeric HTTP-style code (OpenAI, Gemini) or a string code (some proxies)
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl From<StreamErrorBody> for ProviderError {
    fn from(e: StreamErrorBody) -> Self {
        // The HTTP status was already 200; a numeric code is the real one
        let status_code = e
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(200);
        ProviderError::ApiError {
            status_code,
            message: e
                .message
                .unwrap_or_else(|| "Provider reported an error mid-stream".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anmi_core::Provider;

    #[test]
    fn gemini_constructor() {
        let provider = OpenAiCompatProvider::gemini("key");
        assert_eq!(provider.name(), "gemini");
        assert!(provider.base_url.ends_with("/v1beta/openai"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:8000/v1/", "");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::system("Eres ANMI"),
            Message::user("Hola"),
            Message::assistant("Hola, ¿en qué te ayudo?"),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        let roles: Vec<_> = api_messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[test]
    fn request_body_for_streaming_asks_for_usage() {
        let request = ProviderRequest {
            model: "gemini-1.5-flash".into(),
            messages: vec![Message::user("hierro")],
            temperature: 0.0,
            max_tokens: Some(256),
            stream: true,
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 256);

        let body = OpenAiCompatProvider::request_body(&request, false);
        assert!(body.get("stream_options").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hola"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseLine::Chunk { chunk, finish } => {
                assert_eq!(chunk.content.as_deref(), Some("Hola"));
                assert!(!chunk.done);
                assert!(!finish);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_finish_without_content() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        match parse_sse_line(line) {
            SseLine::Chunk { chunk, finish } => {
                assert!(chunk.content.is_none());
                assert!(finish);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_usage_marks_done() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match parse_sse_line(line) {
            SseLine::Chunk { chunk, .. } => {
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 15);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_done_comment_and_empty() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseLine::Skip));
    }

    #[test]
    fn parse_empty_delta_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{"content":""},"finish_reason":null}]}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Skip));
    }

    #[test]
    fn parse_garbage_is_unparseable() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            SseLine::Unparseable(_)
        ));
    }

    #[test]
    fn parse_complete_response() {
        let data = r#"{
            "model": "gemini-1.5-flash",
            "choices": [{"message": {"role": "assistant", "content": "Consume hígado."}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 4, "total_tokens": 104}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Consume hígado.")
        );
    }

    #[test]
    fn parse_error_event_is_an_error() {
        let line = r#"data: {"error":{"message":"quota exceeded","code":429}}"#;
        match parse_sse_line(line) {
            SseLine::Error(ProviderError::ApiError {
                status_code,
                message,
            }) => {
                assert_eq!(status_code, 429);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected error, got {other:?}"),
        }

        let line = r#"data: {"error":{"message":"upstream","code":"server_error"}}"#;
        assert!(matches!(
            parse_sse_line(line),
            SseLine::Error(ProviderError::ApiError { status_code: 200, .. })
        ));
    }

    // --- Decoder tests ---

    fn contents(lines: Vec<SseLine>) -> String {
        lines
            .into_iter()
            .filter_map(|l| match l {
                SseLine::Chunk { chunk, .. } => chunk.content,
                _ => None,
            })
            .collect()
    }

    #[test]
    fn decoder_rejoins_character_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"hígado \"}}]}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::default();
        let first = decoder.feed(&line[..split]);
        assert!(first.is_empty());
        let second = decoder.feed(&line[split..]);
        assert_eq!(contents(second), "hígado ");
    }

    #[test]
    fn decoder_handles_crlf_and_trailing_line() {
        let mut decoder = SseDecoder::default();
        let lines = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"}}]}\r\n\r\ndata: [DO");
        assert_eq!(contents(lines), "Hola");
        assert!(decoder.feed(b"NE]").is_empty());
        assert!(matches!(decoder.flush(), Some(SseLine::Done)));
        assert!(decoder.flush().is_none());
    }

    #[test]
    fn decoder_tracks_finish_reason() {
        let mut decoder = SseDecoder::default();
        decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hola\"}}]}\n");
        assert!(!decoder.finished);
        decoder.feed(b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n");
        assert!(decoder.finished);
    }

    // --- Streaming over a real socket ---

    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve one chunked SSE response, writing each frame as its own chunk.
    async fn serve_frames(frames: Vec<Vec<u8>>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the request: headers, then Content-Length bytes of body
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            while request.len() < header_end + length {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                      transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for frame in frames {
                socket
                    .write_all(format!("{:x}\r\n", frame.len()).as_bytes())
                    .await
                    .unwrap();
                socket.write_all(&frame).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{addr}/v1")
    }

    async fn collect_stream(
        base_url: &str,
    ) -> Vec<std::result::Result<StreamChunk, ProviderError>> {
        let provider = OpenAiCompatProvider::new("test", base_url, "key");
        let request = ProviderRequest {
            model: "gemini-1.5-flash".into(),
            messages: vec![Message::user("hígado")],
            temperature: 0.0,
            max_tokens: None,
            stream: true,
        };
        let mut rx = provider.stream(request).await.unwrap();
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    fn text_of(items: &[std::result::Result<StreamChunk, ProviderError>]) -> String {
        items
            .iter()
            .filter_map(|i| i.as_ref().ok().and_then(|c| c.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn stream_keeps_accents_split_between_network_chunks() {
        let line = b"data: {\"choices\":[{\"delta\":{\"content\":\"h\xC3\xADgado \"}}]}\n\n".to_vec();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let frames = vec![
            line[..split].to_vec(),
            line[split..].to_vec(),
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n".to_vec(),
            b"data: [DONE]\n\n".to_vec(),
        ];

        let items = collect_stream(&serve_frames(frames).await).await;

        assert_eq!(text_of(&items), "hígado ");
        assert!(items.iter().all(|i| i.is_ok()));
        assert!(items.last().unwrap().as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn stream_error_event_surfaces_as_error() {
        let frames = vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hola mam\"}}]}\n\n".to_vec(),
            b"data: {\"error\":{\"message\":\"quota exceeded\",\"code\":429}}\n\n".to_vec(),
        ];

        let items = collect_stream(&serve_frames(frames).await).await;

        assert_eq!(text_of(&items), "Hola mam");
        assert!(matches!(
            items.last(),
            Some(Err(ProviderError::ApiError { status_code: 429, .. }))
        ));
        assert!(!items.iter().any(|i| matches!(i, Ok(c) if c.done)));
    }

    #[tokio::test]
    async fn stream_cut_before_finish_is_interrupted() {
        let frames =
            vec![b"data: {\"choices\":[{\"delta\":{\"content\":\"Ofrece sangre\"}}]}\n\n".to_vec()];

        let items = collect_stream(&serve_frames(frames).await).await;

        assert_eq!(text_of(&items), "Ofrece sangre");
        assert!(matches!(
            items.last(),
            Some(Err(ProviderError::StreamInterrupted(_)))
        ));
    }

    #[tokio::test]
    async fn stream_finished_without_done_marker_completes() {
        let frames = vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Listo.\"}}]}\n\n".to_vec(),
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n".to_vec(),
        ];

        let items = collect_stream(&serve_frames(frames).await).await;

        assert_eq!(text_of(&items), "Listo.");
        assert!(items.last().unwrap().as_ref().unwrap().done);
    }
}
