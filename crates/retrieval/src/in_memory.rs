//! In-memory retriever: useful for tests, demos and small offline corpora.

use std::path::Path;

use async_trait::async_trait;
use paragraf_core::chunk::DocumentChunk;
use paragraf_core::error::{RagError, Result};
use paragraf_core::retriever::{Retriever, SearchParams};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::vector::{cosine_similarity, rank_by_similarity};

const BACKEND_NAME: &str = "in_memory";

/// A corpus entry: chunk text and metadata plus its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
}

/// A retriever that scans a `Vec` with cosine similarity.
///
/// Applies the same threshold, containment filter and ordering rules as the
/// pgvector backend.
#[derive(Debug, Default)]
pub struct InMemoryRetriever {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(chunks: Vec<StoredChunk>) -> Self {
        Self {
            chunks: RwLock::new(chunks),
        }
    }

    /// Load a corpus from a JSON array of [`StoredChunk`]s.
    pub async fn load_json(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::retrieval(BACKEND_NAME, format!("cannot read {}: {e}", path.display()))
        })?;
        let chunks: Vec<StoredChunk> = serde_json::from_str(&raw).map_err(|e| {
            RagError::retrieval(BACKEND_NAME, format!("invalid corpus {}: {e}", path.display()))
        })?;

        info!(path = %path.display(), chunks = chunks.len(), "Loaded in-memory corpus");
        Ok(Self::with_chunks(chunks))
    }

    pub async fn insert(&self, chunk: StoredChunk) {
        self.chunks.write().await.push(chunk);
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn search(&self, embedding: &[f32], params: &SearchParams) -> Result<Vec<DocumentChunk>> {
        let chunks = self.chunks.read().await;

        let matches: Vec<DocumentChunk> = chunks
            .iter()
            .filter(|c| {
                params
                    .metadata_filter
                    .as_ref()
                    .is_none_or(|f| f.matches(&c.metadata))
            })
            .filter_map(|c| {
                if c.embedding.len() != embedding.len() {
                    return None;
                }
                let similarity = cosine_similarity(&c.embedding, embedding);
                (similarity >= params.similarity_threshold).then(|| {
                    DocumentChunk::new(c.id.clone(), c.content.clone(), c.metadata.clone(), similarity)
                })
            })
            .collect();

        let ranked = rank_by_similarity(matches, params.top_k);
        debug!(backend = BACKEND_NAME, results = ranked.len(), "Vector search complete");
        Ok(ranked)
    }
}
