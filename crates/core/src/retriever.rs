//! Retrieval capability: ranked nearest-neighbour search over document chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunk::{DocumentChunk, MetadataFilter};
use crate::error::Result;

/// Fully resolved search parameters. The pipeline substitutes configured
/// defaults before a retriever ever sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Maximum number of chunks to return
    pub top_k: usize,

    /// Minimum similarity a chunk must reach, in `[0, 1]`
    pub similarity_threshold: f32,

    /// Optional structural containment filter over chunk metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_filter: Option<MetadataFilter>,
}

impl SearchParams {
    pub fn new(top_k: usize, similarity_threshold: f32) -> Self {
        Self {
            top_k,
            similarity_threshold,
            metadata_filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<MetadataFilter>) -> Self {
        self.metadata_filter = filter.filter(|f| !f.is_empty());
        self
    }
}

/// A vector store that returns chunks ranked by similarity.
///
/// Implementations must return at most `top_k` chunks, each with
/// `similarity >= similarity_threshold`, ordered by non-increasing
/// similarity. Failures surface as
/// [`RagError::Retrieval`](crate::error::RagError::Retrieval) or
/// [`RagError::Connectivity`](crate::error::RagError::Connectivity).
#[async_trait]
pub trait Retriever: Send + Sync {
    /// A short identity for logs and errors (e.g., "pgvector", "in_memory").
    fn name(&self) -> &str;

    async fn search(&self, embedding: &[f32], params: &SearchParams) -> Result<Vec<DocumentChunk>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_is_dropped() {
        let params = SearchParams::new(8, 0.3).with_filter(Some(MetadataFilter::default()));
        assert!(params.metadata_filter.is_none());

        let params = SearchParams::new(8, 0.3)
            .with_filter(Some(MetadataFilter::default().with("court", "BGH")));
        assert!(params.metadata_filter.is_some());
    }
}
