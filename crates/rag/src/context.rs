//! Context assembly: ranked chunks in, a token-budgeted prompt section out.
//!
//! Chunks are normalized, rendered as numbered source blocks and admitted in
//! rank order until the next block would overflow the budget. Assembly stops
//! at the first block that does not fit, so the included chunks are always a
//! prefix of the ranking. A smaller, lower-ranked chunk never jumps the queue.
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs.

use std::sync::Arc;

use paragraf_core::chunk::DocumentChunk;
use serde::Serialize;
use tracing::{debug, info};

use crate::normalize::TextNormalizer;
use crate::prompts;
use crate::token::{CharHeuristicCounter, TokenCounter};

/// The result of fitting ranked chunks into a token budget.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssembledContext {
    /// The rendered context section, or `""` when nothing fit.
    pub text: String,
    /// The chunks that made it in, in rank order.
    pub included: Vec<DocumentChunk>,
    /// Tokens consumed by the included blocks. The section wrapper is not counted.
    pub tokens_used: usize,
    /// Chunks left out once the budget was reached.
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

/// Renders ranked chunks into the context section under a token budget.
#[derive(Clone)]
pub struct ContextAssembler {
    normalizer: TextNormalizer,
    counter: Arc<dyn TokenCounter>,
}

impl ContextAssembler {
    pub fn new(normalizer: TextNormalizer, counter: Arc<dyn TokenCounter>) -> Self {
        Self { normalizer, counter }
    }

    /// An assembler using the character heuristic counter.
    pub fn with_normalizer(normalizer: TextNormalizer) -> Self {
        Self::new(normalizer, Arc::new(CharHeuristicCounter))
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Fit `chunks` (ranked, best first) into `budget` tokens.
    pub fn assemble(&self, chunks: &[DocumentChunk], budget: usize) -> AssembledContext {
        let mut blocks = Vec::new();
        let mut included = Vec::new();
        let mut tokens_used = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            let block = prompts::source_block(
                i + 1,
                chunk.similarity,
                &chunk.source_display(),
                &self.normalizer.normalize(&chunk.content),
            );
            let block_tokens = self.counter.count(&block);

            if tokens_used + block_tokens > budget {
                info!(
                    chunks_included = i,
                    tokens_used,
                    budget,
                    "Context budget reached"
                );
                break;
            }

            blocks.push(block);
            included.push(chunk.clone());
            tokens_used += block_tokens;
        }

        let dropped = chunks.len() - included.len();
        if blocks.is_empty() {
            debug!(candidates = chunks.len(), "No chunks fit the context budget");
            return AssembledContext {
                dropped,
                ..AssembledContext::default()
            };
        }

        info!(chunks = included.len(), tokens = tokens_used, scheme = self.counter.scheme(), "Context assembled");
        AssembledContext {
            text: prompts::context_section(&blocks.join("\n")),
            included,
            tokens_used,
            dropped,
        }
    }
}

impl std::fmt::Debug for ContextAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextAssembler")
            .field("rules", &self.normalizer.rules().version())
            .field("counter", &self.counter.scheme())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, json};
    use std::sync::LazyLock;

    static ASSEMBLER: LazyLock<ContextAssembler> =
        LazyLock::new(|| ContextAssembler::with_normalizer(TextNormalizer::builtin().unwrap()));

    fn assembler() -> &'static ContextAssembler {
        &ASSEMBLER
    }

    fn chunk(id: &str, content: &str, similarity: f32) -> DocumentChunk {
        let metadata = json!({"title": "BGB", "section": format!("§ {id}")});
        DocumentChunk::new(id, content, metadata.as_object().cloned().unwrap(), similarity)
    }

    #[test]
    fn empty_input_gives_empty_context() {
        let ctx = assembler().assemble(&[], 6000);
        assert_eq!(ctx.text, "");
        assert!(ctx.is_empty());
        assert_eq!(ctx.tokens_used, 0);
    }

    #[test]
    fn renders_numbered_normalized_blocks() {
        let chunks = vec![
            chunk("823", "Wer V ors atz handelt , haftet nach B GB .", 0.91),
            chunk("826", "Sittenwidrige Schädigung", 0.40),
        ];
        let ctx = assembler().assemble(&chunks, 6000);

        assert_eq!(ctx.included.len(), 2);
        assert_eq!(ctx.dropped, 0);
        assert!(ctx.text.starts_with("## Relevante Quellen\n\n### Quelle 1 (Ähnlichkeit: 91%)\n"));
        assert!(ctx.text.contains("**Herkunft:** BGB – § 823\nWer Vorsatz handelt, haftet nach BGB.\n"));
        assert!(ctx.text.contains("\n\n### Quelle 2 (Ähnlichkeit: 40%)\n**Herkunft:** BGB – § 826\n"));
        assert!(ctx.text.ends_with("Sittenwidrige Schädigung\n\n"));
    }

    #[test]
    fn metadata_free_chunk_uses_id_label() {
        let chunks = vec![DocumentChunk::new("42", "Text", Map::new(), 0.5)];
        let ctx = assembler().assemble(&chunks, 6000);
        assert!(ctx.text.contains("**Herkunft:** Dokument #42\n"));
    }

    #[test]
    fn stops_at_first_block_that_overflows() {
        let chunks = vec![
            chunk("1", &"a".repeat(40), 0.9),
            chunk("2", &"b".repeat(400), 0.8),
            chunk("3", "kurz", 0.7),
        ];
        let first_block_tokens = assembler().assemble(&chunks[..1], 10_000).tokens_used;

        let ctx = assembler().assemble(&chunks, first_block_tokens + 30);
        let ids: Vec<&str> = ctx.included.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
        assert_eq!(ctx.dropped, 2);
        assert_eq!(ctx.tokens_used, first_block_tokens);
    }

    #[test]
    fn zero_budget_includes_nothing() {
        let ctx = assembler().assemble(&[chunk("1", "x", 0.9)], 0);
        assert!(ctx.is_empty());
        assert_eq!(ctx.text, "");
        assert_eq!(ctx.dropped, 1);
    }

    proptest! {
        #[test]
        fn included_is_a_prefix_within_budget(
            sizes in prop::collection::vec(0usize..600, 0..12),
            budget in 0usize..1500,
        ) {
            let chunks: Vec<DocumentChunk> = sizes
                .iter()
                .enumerate()
                .map(|(i, n)| chunk(&i.to_string(), &"x".repeat(*n), 0.5))
                .collect();
            let ctx = assembler().assemble(&chunks, budget);

            prop_assert!(ctx.tokens_used <= budget);
            prop_assert_eq!(ctx.included.len() + ctx.dropped, chunks.len());
            prop_assert_eq!(&chunks[..ctx.included.len()], ctx.included.as_slice());
            prop_assert_eq!(ctx.text.is_empty(), ctx.included.is_empty());
        }
    }
}
