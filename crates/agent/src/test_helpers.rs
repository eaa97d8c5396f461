//! Shared test helpers for the turn pipeline.

use crate::stream_event::StreamEvent;
use anmi_core::error::{IndexError, ProviderError};
use anmi_core::index::{SearchHit, SearchIndex, SearchRequest, UploadSummary};
use anmi_core::message::Message;
use anmi_core::passage::Passage;
use anmi_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// An index that returns the same hits (or error) for every query
/// and records the requests it saw.
pub struct ScriptedIndex {
    result: Result<Vec<SearchHit>, IndexError>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedIndex {
    pub fn with_hits(contents: &[&str]) -> Self {
        Self {
            result: Ok(contents
                .iter()
                .map(|c| SearchHit {
                    content: c.to_string(),
                })
                .collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: IndexError) -> Self {
        Self {
            result: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchIndex for ScriptedIndex {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>, IndexError> {
        self.requests.lock().unwrap().push(request);
        self.result.clone()
    }

    async fn upload(&self, passages: &[Passage]) -> Result<UploadSummary, IndexError> {
        Ok(UploadSummary {
            succeeded: passages.len(),
            total: passages.len(),
        })
    }
}

/// A mock provider that answers from a queue of scripted texts.
///
/// `stream` splits each answer into fixed-size character fragments so the
/// re-segmenter sees word boundaries fall mid-fragment. Every request is
/// recorded for inspection. Panics when the queue runs dry.
pub struct SequentialMockProvider {
    answers: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    fragment_chars: usize,
    fragment_delay: Duration,
}

impl SequentialMockProvider {
    pub fn new(answers: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            answers: Mutex::new(answers),
            requests: Mutex::new(Vec::new()),
            fragment_chars: 4,
            fragment_delay: Duration::ZERO,
        }
    }

    pub fn texts(answers: &[&str]) -> Self {
        Self::new(answers.iter().map(|a| Ok(a.to_string())).collect())
    }

    /// Sleep between streamed fragments.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_answer(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            panic!("SequentialMockProvider: no more answers");
        }
        answers.remove(0)
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text = self.next_answer(request)?;
        Ok(make_text_response(&text))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let text = self.next_answer(request)?;
        let chars: Vec<char> = text.chars().collect();
        let fragments: Vec<String> = chars
            .chunks(self.fragment_chars)
            .map(|c| c.iter().collect())
            .collect();
        let delay = self.fragment_delay;

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let chunk = StreamChunk {
                    content: Some(fragment),
                    ..StreamChunk::default()
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                }))
                .await;
        });
        Ok(rx)
    }
}

/// A provider whose stream is fed by the test through the returned sender.
pub struct ChannelProvider {
    receiver: Mutex<Option<ChunkReceiver>>,
}

impl ChannelProvider {
    pub fn new() -> (Self, mpsc::Sender<Result<StreamChunk, ProviderError>>) {
        let (tx, rx) = chunk_channel();
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait::async_trait]
impl Provider for ChannelProvider {
    fn name(&self) -> &str {
        "channel"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("stream only".into()))
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ProviderError::NotConfigured("stream already taken".into()))
    }
}

pub fn chunk_channel() -> (
    mpsc::Sender<Result<StreamChunk, ProviderError>>,
    ChunkReceiver,
) {
    mpsc::channel(16)
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// The word tokens of a stream, in order.
pub fn collect_words(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Word { token } => Some(token.clone()),
            _ => None,
        })
        .collect()
}
