//! # Paragraf RAG
//!
//! The retrieval-augmented generation pipeline for German legal questions,
//! plus the text machinery it needs:
//!
//! - [`normalize`]: OCR repair for corpus text and generated answers
//! - [`token`]: token estimation for context budgeting
//! - [`context`]: greedy, budgeted assembly of ranked sources
//! - [`postprocess`]: markdown and word repair on complete answers
//! - [`pipeline`]: the orchestrator tying embedder, retriever and provider together

pub mod context;
pub mod normalize;
pub mod pipeline;
pub mod postprocess;
pub mod prompts;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{AssembledContext, ContextAssembler};
pub use normalize::{CompoundRepair, RULE_TABLE_VERSION, RuleTable, TextNormalizer};
pub use pipeline::{PipelineSettings, RagPipeline, RagResult, RagStream, RetrievalOptions};
pub use postprocess::AnswerPostProcessor;
pub use token::{CharHeuristicCounter, TokenCounter, estimate_tokens};
