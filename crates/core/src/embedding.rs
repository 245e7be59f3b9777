//! Embedding capability: query text to a fixed-dimension vector.

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a dense vector in the same space as the indexed corpus.
///
/// Failures surface as [`RagError::Embedding`](crate::error::RagError::Embedding).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// A short identity for logs and errors.
    fn name(&self) -> &str;

    /// Embed a single query string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of every vector this embedder returns.
    fn dimensions(&self) -> usize;
}
