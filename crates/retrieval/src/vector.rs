//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and ranking, matching what pgvector computes
//! as `1 - (a <=> b)`.

use paragraf_core::chunk::DocumentChunk;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Sort by descending similarity and keep the best `limit`.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank_by_similarity(mut chunks: Vec<DocumentChunk>, limit: usize) -> Vec<DocumentChunk> {
    chunks.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    chunks.truncate(limit);
    chunks
}
