//! Provider factory: builds the configured backends once at startup.
//!
//! The selected generation backend is resolved from `llm_provider`; an
//! unknown identity fails here, before any request is served.

use std::sync::Arc;

use paragraf_config::AppConfig;
use paragraf_core::embedding::Embedder;
use paragraf_core::error::{RagError, Result};
use paragraf_core::provider::GenerationProvider;
use tracing::info;

use crate::azure_openai::AzureOpenAiProvider;
use crate::embeddings::AzureOpenAiEmbedder;
use crate::gemini::GeminiProvider;

/// Build the generation provider named by `config.llm_provider`.
pub fn build_generation_provider(config: &AppConfig) -> Result<Arc<dyn GenerationProvider>> {
    let provider: Arc<dyn GenerationProvider> = match config.llm_provider.trim().to_ascii_lowercase().as_str() {
        "azure" => Arc::new(AzureOpenAiProvider::from_config(&config.azure)?),
        "gemini" => Arc::new(GeminiProvider::from_config(&config.gemini)?),
        _ => return Err(RagError::UnsupportedProvider(config.llm_provider.clone())),
    };

    info!(provider = provider.name(), model = provider.model(), "Generation provider ready");
    Ok(provider)
}

/// Build the query embedder. Embeddings always come from Azure OpenAI,
/// since the corpus was indexed with its embedding deployment.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    let embedder = AzureOpenAiEmbedder::from_config(&config.azure)?;
    Ok(Arc::new(embedder))
}
