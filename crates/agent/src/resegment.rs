//! Stream re-segmentation — backend fragments in, paced words out.
//!
//! Backends stream arbitrary slices of text. Clients get one word unit at a
//! time: a run of non-space characters plus its trailing space, with the
//! final remainder flushed bare when the backend finishes. Each unit is
//! followed by a short random pause so the output reads smoothly.

use crate::stream_event::{GENERIC_STREAM_ERROR, StreamEvent};
use anmi_core::error::ProviderError;
use anmi_core::provider::{ChunkReceiver, StreamChunk, Usage};
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

/// Incremental splitter holding the not-yet-terminated tail.
#[derive(Debug, Default)]
pub struct WordSegmenter {
    buffer: String,
}

impl WordSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns every unit completed by it, in order.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);
        let mut words = Vec::new();
        while let Some(pos) = self.buffer.find(' ') {
            words.push(self.buffer.drain(..=pos).collect());
        }
        words
    }

    /// End of input: the remainder, if any, without a trailing space.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Delay bounds between emitted units.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        let (lo, hi) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self {
            min_ms: lo,
            max_ms: hi,
        }
    }

    /// No pauses at all.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn from_config(config: &anmi_config::StreamConfig) -> Self {
        Self::new(config.min_delay_ms, config.max_delay_ms)
    }

    fn next_delay(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(10, 40)
    }
}

/// How a pump run ended.
#[derive(Debug)]
pub enum PumpOutcome {
    /// Every fragment was delivered; `text` is their concatenation.
    Completed { text: String, usage: Option<Usage> },

    /// The consumer went away; the backend receiver has been dropped.
    Cancelled,

    /// The backend reported an error mid-stream.
    Failed(ProviderError),
}

/// Send one unit then pause. `false` when the consumer is gone.
async fn emit(tx: &mpsc::Sender<StreamEvent>, token: String, pacing: &Pacing) -> bool {
    trace!(token = %token, "Emitting word");
    if tx.send(StreamEvent::Word { token }).await.is_err() {
        return false;
    }
    let delay = pacing.next_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    true
}

/// Drive backend fragments through the segmenter into `tx`.
///
/// Does not send the end marker; the caller decides what follows.
async fn pump(
    mut source: ChunkReceiver,
    tx: &mpsc::Sender<StreamEvent>,
    pacing: &Pacing,
) -> PumpOutcome {
    let mut segmenter = WordSegmenter::new();
    let mut text = String::new();
    let mut usage = None;

    loop {
        let item = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!("Stream consumer dropped while waiting on backend");
                return PumpOutcome::Cancelled;
            }
            item = source.recv() => item,
        };

        let chunk = match item {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return PumpOutcome::Failed(e),
            None => break,
        };

        if let Some(content) = chunk.content.as_deref() {
            text.push_str(content);
            for word in segmenter.push(content) {
                if !emit(tx, word, pacing).await {
                    debug!("Stream consumer dropped mid-answer");
                    return PumpOutcome::Cancelled;
                }
            }
        }

        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
        if chunk.done {
            break;
        }
    }

    if let Some(rest) = segmenter.finish() {
        if !emit(tx, rest, pacing).await {
            return PumpOutcome::Cancelled;
        }
    }

    PumpOutcome::Completed { text, usage }
}

/// A finished source holding one complete text (refusals, canned replies).
pub fn text_source(text: impl Into<String>) -> ChunkReceiver {
    let (tx, rx) = mpsc::channel(1);
    let _ = tx.try_send(Ok(StreamChunk {
        content: Some(text.into()),
        done: true,
        usage: None,
    }));
    rx
}

/// Re-segment a backend stream on its own task.
///
/// Yields the word units followed by `Done`, or by `Error` with a generic
/// message if the backend fails. `settle` sees the outcome before the end
/// marker is sent, so work it does (recording the answer) is visible to a
/// consumer that has received `Done`. Dropping the returned stream stops the
/// task and releases the backend receiver.
pub fn resegment<F>(source: ChunkReceiver, pacing: Pacing, settle: F) -> ReceiverStream<StreamEvent>
where
    F: FnOnce(&PumpOutcome) + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let outcome = pump(source, &tx, &pacing).await;
        settle(&outcome);

        match outcome {
            PumpOutcome::Completed { .. } => {
                let _ = tx.send(StreamEvent::Done).await;
            }
            PumpOutcome::Failed(e) => {
                warn!(error = %e, "Backend stream failed");
                let _ = tx
                    .send(StreamEvent::Error {
                        message: GENERIC_STREAM_ERROR.into(),
                    })
                    .await;
            }
            PumpOutcome::Cancelled => {}
        }
    });
    ReceiverStream::new(rx)
}
