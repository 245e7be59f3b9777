//! Generation provider trait: the abstraction over LLM chat backends.
//!
//! A provider turns a role-tagged message sequence into either a complete
//! answer or a lazy stream of text fragments. The pipeline never knows which
//! vendor is behind the trait object.
//!
//! Implementations: Azure OpenAI chat completions, Google Gemini.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ProviderError, RagError, Result};
use crate::message::RoleMessage;

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// One event pushed by a provider's streaming task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text delta, in arrival order
    Fragment(String),
    /// The backend signalled normal completion
    Done,
}

type StreamItem = std::result::Result<StreamEvent, ProviderError>;

/// Producer half of a [`FragmentStream`], held by the provider's streaming task.
#[derive(Debug)]
pub struct FragmentSender {
    tx: mpsc::Sender<StreamItem>,
}

impl FragmentSender {
    /// Push a text delta. Returns `false` once the consumer has gone away,
    /// at which point the producer should stop and drop its backend response.
    pub async fn fragment(&self, text: impl Into<String>) -> bool {
        self.tx.send(Ok(StreamEvent::Fragment(text.into()))).await.is_ok()
    }

    /// Signal normal completion.
    pub async fn finish(self) {
        let _ = self.tx.send(Ok(StreamEvent::Done)).await;
    }

    /// Terminate the stream with a failure.
    pub async fn fail(self, err: ProviderError) {
        let _ = self.tx.send(Err(err)).await;
    }

    /// Resolves when the consumer drops the stream.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A finite, pull-driven sequence of answer fragments.
///
/// - yields `Ok(fragment)` for every non-empty delta;
/// - ends (`None`) after the backend's completion signal;
/// - yields a single `Err(RagError::Generation)` on a mid-stream failure, or
///   when the producer disappears without signalling completion, then ends.
///
/// Dropping the stream closes the channel; the producing task observes this
/// and releases the backend request.
#[derive(Debug)]
pub struct FragmentStream {
    provider: String,
    rx: mpsc::Receiver<StreamItem>,
    finished: bool,
}

impl FragmentStream {
    /// Create a connected sender/stream pair with a bounded buffer.
    pub fn channel(provider: impl Into<String>, buffer: usize) -> (FragmentSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            FragmentSender { tx },
            Self {
                provider: provider.into(),
                rx,
                finished: false,
            },
        )
    }

    /// A completed stream over already-known fragments.
    pub fn from_fragments(provider: impl Into<String>, fragments: Vec<String>) -> Self {
        let mut events: Vec<StreamItem> = fragments
            .into_iter()
            .map(|f| Ok(StreamEvent::Fragment(f)))
            .collect();
        events.push(Ok(StreamEvent::Done));
        Self::from_events(provider, events)
    }

    /// A stream replaying the given events verbatim. Without a trailing
    /// [`StreamEvent::Done`] the stream reports an interruption.
    pub fn from_events(provider: impl Into<String>, events: Vec<StreamItem>) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // capacity covers every event
            let _ = tx.try_send(event);
        }
        Self {
            provider: provider.into(),
            rx,
            finished: false,
        }
    }

    /// Name of the provider producing this stream.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn fail(&mut self, source: ProviderError) -> Poll<Option<Result<String>>> {
        self.finished = true;
        self.rx.close();
        Poll::Ready(Some(Err(RagError::generation(self.provider.clone(), source))))
    }
}

impl futures::Stream for FragmentStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        loop {
            match ready!(self.rx.poll_recv(cx)) {
                Some(Ok(StreamEvent::Fragment(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(text)));
                }
                Some(Ok(StreamEvent::Done)) => {
                    self.finished = true;
                    self.rx.close();
                    return Poll::Ready(None);
                }
                Some(Err(e)) => return self.fail(e),
                None => {
                    return self.fail(ProviderError::StreamInterrupted(
                        "stream closed before completion".into(),
                    ));
                }
            }
        }
    }
}

/// The core generation capability.
///
/// Every chat backend implements this trait. The pipeline calls
/// `generate()` or `generate_stream()` through `Arc<dyn GenerationProvider>`
/// and never retries; retry policy belongs to the caller.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// A short identity for logs and errors (e.g., "azure", "gemini").
    fn name(&self) -> &str;

    /// The model or deployment this provider talks to.
    fn model(&self) -> &str;

    /// Send the messages and wait for the complete answer.
    async fn generate(&self, messages: &[RoleMessage], params: &GenerationParams)
    -> Result<String>;

    /// Send the messages and receive the answer as a lazy fragment stream.
    ///
    /// Default implementation calls `generate()` and wraps the answer as a
    /// single fragment.
    async fn generate_stream(
        &self,
        messages: &[RoleMessage],
        params: &GenerationParams,
    ) -> Result<FragmentStream> {
        let answer = self.generate(messages, params).await?;
        Ok(FragmentStream::from_fragments(self.name(), vec![answer]))
    }
}
