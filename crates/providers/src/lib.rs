//! Generation and embedding backends for Paragraf.
//!
//! Chat providers implement `paragraf_core::GenerationProvider`; the
//! embedder implements `paragraf_core::Embedder`. The factory selects the
//! configured backend once at startup.

mod http;
mod sse;

pub mod azure_openai;
pub mod embeddings;
pub mod factory;
pub mod gemini;

pub use azure_openai::AzureOpenAiProvider;
pub use embeddings::AzureOpenAiEmbedder;
pub use factory::{build_embedder, build_generation_provider};
pub use gemini::GeminiProvider;
