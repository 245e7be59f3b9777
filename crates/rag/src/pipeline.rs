//! The RAG pipeline: embed, retrieve, assemble, generate, post-process.
//!
//! # Flow
//!
//! 1. Embed the query
//! 2. Search the retriever with the resolved parameters
//! 3. Fit the ranked chunks into the context budget
//! 4. Build the message sequence (system, context, history, query)
//! 5. Generate, either as one answer or as a fragment stream
//! 6. Post-process the complete answer
//!
//! Every stage fails fast with its own
//! [`RagError`](paragraf_core::error::RagError) kind. Nothing is retried
//! or downgraded here.

use std::sync::Arc;

use futures::StreamExt;
use paragraf_config::RagConfig;
use paragraf_core::chunk::{DocumentChunk, MetadataFilter};
use paragraf_core::embedding::Embedder;
use paragraf_core::error::Result;
use paragraf_core::message::{ConversationMessage, RoleMessage};
use paragraf_core::provider::{FragmentStream, GenerationParams, GenerationProvider};
use paragraf_core::retriever::{Retriever, SearchParams};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::context::{AssembledContext, ContextAssembler};
use crate::normalize::TextNormalizer;
use crate::postprocess::AnswerPostProcessor;
use crate::prompts;

/// Longest query prefix written to log fields.
const LOGGED_QUERY_CHARS: usize = 100;

/// Defaults the pipeline substitutes for unset per-call options.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub max_context_tokens: usize,
    /// How many trailing history turns are replayed; 0 disables history
    pub max_conversation_turns: usize,
    pub generation: GenerationParams,
}

impl From<&RagConfig> for PipelineSettings {
    fn from(config: &RagConfig) -> Self {
        Self {
            top_k: config.retrieval_top_k,
            similarity_threshold: config.similarity_threshold,
            max_context_tokens: config.max_context_tokens,
            max_conversation_turns: config.max_conversation_turns,
            generation: GenerationParams {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&RagConfig::default())
    }
}

/// Per-call retrieval overrides. `None` means "use the configured default";
/// explicit values, including 0, are honored as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOptions {
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub metadata_filter: Option<MetadataFilter>,
}

impl RetrievalOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.metadata_filter = Some(filter);
        self
    }
}

/// A complete answer with the sources it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct RagResult {
    /// The post-processed answer
    pub answer: String,
    /// The chunks that made it into the context, in rank order
    pub sources: Vec<DocumentChunk>,
    /// The query as sent to retrieval
    pub query_used: String,
    /// Tokens consumed by the context blocks
    pub context_tokens: usize,
}

/// A streaming answer. The sources are known before the first fragment.
pub struct RagStream {
    /// Raw answer fragments in arrival order
    pub fragments: FragmentStream,
    pub sources: Vec<DocumentChunk>,
    pub query_used: String,
    pub context_tokens: usize,
    postprocessor: AnswerPostProcessor,
}

impl RagStream {
    /// Drain the fragments and post-process the joined answer.
    ///
    /// A mid-stream failure is returned as the error; `sources` stays
    /// readable afterwards.
    pub async fn collect_answer(&mut self) -> Result<String> {
        let mut answer = String::new();
        while let Some(fragment) = self.fragments.next().await {
            answer.push_str(&fragment?);
        }
        Ok(self.postprocessor.process(&answer))
    }
}

impl std::fmt::Debug for RagStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagStream")
            .field("provider", &self.fragments.provider())
            .field("sources", &self.sources.len())
            .field("query_used", &self.query_used)
            .finish()
    }
}

/// Messages ready for generation plus what went into them.
struct Prepared {
    context: AssembledContext,
    messages: Vec<RoleMessage>,
}

/// The orchestrator. Holds its capabilities behind `Arc`s, so one pipeline
/// serves concurrent calls without any per-call state.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Arc<dyn Retriever>,
    provider: Arc<dyn GenerationProvider>,
    assembler: ContextAssembler,
    postprocessor: AnswerPostProcessor,
    settings: PipelineSettings,
}

impl RagPipeline {
    /// Build a pipeline with the built-in rule table and token counter.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Arc<dyn Retriever>,
        provider: Arc<dyn GenerationProvider>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let normalizer = TextNormalizer::builtin()?;
        Ok(Self {
            embedder,
            retriever,
            provider,
            assembler: ContextAssembler::with_normalizer(normalizer.clone()),
            postprocessor: AnswerPostProcessor::new(normalizer)?,
            settings,
        })
    }

    /// Replace the context assembler (custom rules or token counter).
    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Replace the answer post-processor.
    pub fn with_postprocessor(mut self, postprocessor: AnswerPostProcessor) -> Self {
        self.postprocessor = postprocessor;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn provider(&self) -> &dyn GenerationProvider {
        self.provider.as_ref()
    }

    /// Embed the query and search for ranked chunks.
    pub async fn retrieve(&self, query: &str, options: &RetrievalOptions) -> Result<Vec<DocumentChunk>> {
        let embedding = self.embedder.embed(query).await.inspect_err(|e| {
            warn!(embedder = self.embedder.name(), error = %e, "RAG: query embedding failed");
        })?;

        let params = self.search_params(options);
        debug!(
            top_k = params.top_k,
            threshold = params.similarity_threshold,
            filtered = params.metadata_filter.is_some(),
            "RAG: starting retrieval"
        );

        let chunks = self.retriever.search(&embedding, &params).await.inspect_err(|e| {
            warn!(retriever = self.retriever.name(), kind = e.kind(), error = %e, "RAG: retrieval failed");
        })?;

        debug!(chunks = chunks.len(), "RAG: chunks retrieved");
        Ok(chunks)
    }

    /// Assemble the message sequence sent to the provider.
    ///
    /// Order: system prompt; when `context` is non-empty, the context as a
    /// user message followed by a fixed assistant acknowledgement; the last
    /// `max_conversation_turns` history entries verbatim; the live query.
    pub fn build_messages(&self, context: &str, query: &str, history: &[ConversationMessage]) -> Vec<RoleMessage> {
        let mut messages = vec![RoleMessage::system(prompts::SYSTEM_PROMPT)];

        if !context.is_empty() {
            messages.push(RoleMessage::user(context));
            messages.push(RoleMessage::assistant(prompts::CONTEXT_ACK));
        }

        let start = history.len().saturating_sub(self.settings.max_conversation_turns);
        messages.extend(history[start..].iter().map(RoleMessage::from));

        messages.push(RoleMessage::user(query));
        messages
    }

    /// Answer `query` from retrieved sources.
    pub async fn run(
        &self,
        query: &str,
        history: &[ConversationMessage],
        options: &RetrievalOptions,
    ) -> Result<RagResult> {
        let span = info_span!("rag_run", request_id = %Uuid::new_v4(), query = %log_query(query));
        async move {
            info!(model = self.provider.model(), "RAG: starting run");
            let prepared = self.prepare(query, history, options).await?;

            let raw = self
                .provider
                .generate(&prepared.messages, &self.settings.generation)
                .await
                .inspect_err(|e| warn!(error = %e, "RAG: generation failed"))?;
            let answer = self.postprocessor.process(&raw);

            info!(
                sources = prepared.context.included.len(),
                answer_len = answer.len(),
                "RAG: response generated"
            );

            Ok(RagResult {
                answer,
                sources: prepared.context.included,
                query_used: query.to_string(),
                context_tokens: prepared.context.tokens_used,
            })
        }
        .instrument(span)
        .await
    }

    /// Like [`run`](Self::run), but hands back the provider's fragment stream
    /// unconsumed together with the sources.
    pub async fn run_stream(
        &self,
        query: &str,
        history: &[ConversationMessage],
        options: &RetrievalOptions,
    ) -> Result<RagStream> {
        let span = info_span!("rag_stream", request_id = %Uuid::new_v4(), query = %log_query(query));
        async move {
            info!(model = self.provider.model(), "RAG: starting stream");
            let prepared = self.prepare(query, history, options).await?;

            let fragments = self
                .provider
                .generate_stream(&prepared.messages, &self.settings.generation)
                .await
                .inspect_err(|e| warn!(error = %e, "RAG: stream request failed"))?;

            info!(sources = prepared.context.included.len(), "RAG: stream opened");
            Ok(RagStream {
                fragments,
                sources: prepared.context.included,
                query_used: query.to_string(),
                context_tokens: prepared.context.tokens_used,
                postprocessor: self.postprocessor.clone(),
            })
        }
        .instrument(span)
        .await
    }

    /// Retrieval only, without generation.
    pub async fn search_only(&self, query: &str, options: &RetrievalOptions) -> Result<Vec<DocumentChunk>> {
        let span = info_span!("rag_search", request_id = %Uuid::new_v4(), query = %log_query(query));
        self.retrieve(query, options).instrument(span).await
    }

    async fn prepare(
        &self,
        query: &str,
        history: &[ConversationMessage],
        options: &RetrievalOptions,
    ) -> Result<Prepared> {
        let chunks = self.retrieve(query, options).await?;
        let context = self.assembler.assemble(&chunks, self.settings.max_context_tokens);
        let messages = self.build_messages(&context.text, query, history);
        debug!(
            messages = messages.len(),
            context_tokens = context.tokens_used,
            dropped = context.dropped,
            "RAG: messages built"
        );
        Ok(Prepared { context, messages })
    }

    fn search_params(&self, options: &RetrievalOptions) -> SearchParams {
        SearchParams::new(
            options.top_k.unwrap_or(self.settings.top_k),
            options
                .similarity_threshold
                .unwrap_or(self.settings.similarity_threshold),
        )
        .with_filter(options.metadata_filter.clone())
    }
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("embedder", &self.embedder.name())
            .field("retriever", &self.retriever.name())
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

fn log_query(query: &str) -> String {
    query.chars().take(LOGGED_QUERY_CHARS).collect()
}
