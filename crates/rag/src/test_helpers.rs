//! Shared test fakes for pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use paragraf_core::chunk::DocumentChunk;
use paragraf_core::embedding::Embedder;
use paragraf_core::error::{ProviderError, RagError, Result};
use paragraf_core::message::RoleMessage;
use paragraf_core::provider::{FragmentStream, GenerationParams, GenerationProvider, StreamEvent};
use paragraf_core::retriever::{Retriever, SearchParams};
use serde_json::json;

/// An embedder returning a fixed vector, or failing every call.
pub struct MockEmbedder {
    vector: Vec<f32>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn name(&self) -> &str {
        "mock_embedder"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::embedding(
                "mock_embedder",
                ProviderError::Network("connection refused".into()),
            ));
        }
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// A retriever returning canned chunks and recording the params it saw.
pub struct MockRetriever {
    chunks: Vec<DocumentChunk>,
    fail: bool,
    calls: AtomicUsize,
    last_params: Mutex<Option<SearchParams>>,
}

impl MockRetriever {
    pub fn new(chunks: Vec<DocumentChunk>) -> Self {
        Self {
            chunks,
            fail: false,
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<SearchParams> {
        self.last_params.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        "mock_retriever"
    }

    async fn search(&self, _embedding: &[f32], params: &SearchParams) -> Result<Vec<DocumentChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params.clone());
        if self.fail {
            return Err(RagError::retrieval("mock_retriever", "relation \"documents2\" does not exist"));
        }
        Ok(self.chunks.iter().take(params.top_k).cloned().collect())
    }
}

/// A provider with a scripted answer and scripted stream events.
pub struct ScriptedProvider {
    answer: String,
    events: Vec<std::result::Result<StreamEvent, ProviderError>>,
    fail: bool,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<RoleMessage>>,
}

impl ScriptedProvider {
    /// Answers with `answer`; streams it as word-sized fragments.
    pub fn answering(answer: &str) -> Self {
        let mut events: Vec<_> = answer
            .split_inclusive(' ')
            .map(|w| Ok(StreamEvent::Fragment(w.to_string())))
            .collect();
        events.push(Ok(StreamEvent::Done));
        Self::with_events(answer, events)
    }

    pub fn with_events(answer: &str, events: Vec<std::result::Result<StreamEvent, ProviderError>>) -> Self {
        Self {
            answer: answer.to_string(),
            events,
            fail: false,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::answering("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<RoleMessage> {
        self.last_messages.lock().unwrap().clone()
    }

    fn record(&self, messages: &[RoleMessage]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        if self.fail {
            return Err(RagError::generation(
                "scripted",
                ProviderError::ApiError {
                    status_code: 500,
                    message: "internal error".into(),
                },
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, messages: &[RoleMessage], _params: &GenerationParams) -> Result<String> {
        self.record(messages)?;
        Ok(self.answer.clone())
    }

    async fn generate_stream(
        &self,
        messages: &[RoleMessage],
        _params: &GenerationParams,
    ) -> Result<FragmentStream> {
        self.record(messages)?;
        Ok(FragmentStream::from_events("scripted", self.events.clone()))
    }
}

/// A chunk titled after a statute with the given similarity.
pub fn make_chunk(id: &str, content: &str, similarity: f32) -> DocumentChunk {
    let metadata = json!({"title": "BGB", "section": format!("§ {id}")});
    DocumentChunk::new(id, content, metadata.as_object().cloned().unwrap_or_default(), similarity)
}
