//! Azure OpenAI embedding client.
//!
//! Embeds query text with the same deployment that indexed the corpus
//! (`text-embedding-3-small`, 1536 dimensions by default).

use async_trait::async_trait;
use paragraf_config::AzureConfig;
use paragraf_core::embedding::Embedder;
use paragraf_core::error::{ProviderError, RagError, Result};
use serde::Deserialize;
use tracing::debug;

use crate::azure_openai::credentials;
use crate::http;

const PROVIDER_NAME: &str = "azure";

/// Dimensionality of `text-embedding-3-small`.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// An [`Embedder`] backed by an Azure OpenAI embeddings deployment.
pub struct AzureOpenAiEmbedder {
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl AzureOpenAiEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        timeout_secs: u64,
    ) -> std::result::Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            dimensions: DEFAULT_DIMENSIONS,
            client: http::build_client(timeout_secs)?,
        })
    }

    /// Build from the `[azure]` config section, requiring endpoint and key.
    pub fn from_config(config: &AzureConfig) -> Result<Self> {
        let (endpoint, api_key) = credentials(config)?;
        Self::new(
            endpoint,
            api_key,
            &config.embedding_deployment,
            &config.api_version,
            config.timeout_secs,
        )
        .map_err(|e| RagError::Config(e.to_string()))
    }

    /// Override the expected vector size (for `text-embedding-3-large` etc.).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    async fn request(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        debug!(provider = PROVIDER_NAME, deployment = %self.deployment, chars = text.len(), "Sending embedding request");

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "input": text }))
            .send()
            .await
            .map_err(http::transport_error)?;
        let response = http::check_status(PROVIDER_NAME, response).await?;

        let api_resp: EmbeddingApiResponse = http::read_json(response).await?;
        extract_embedding(api_resp, self.dimensions)
    }
}

fn extract_embedding(
    api_resp: EmbeddingApiResponse,
    dimensions: usize,
) -> std::result::Result<Vec<f32>, ProviderError> {
    let embedding = api_resp
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::InvalidResponse("No embedding in response".into()))?;

    if embedding.len() != dimensions {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {dimensions} dimensions, got {}",
            embedding.len()
        )));
    }
    Ok(embedding)
}

#[async_trait]
impl Embedder for AzureOpenAiEmbedder {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(text)
            .await
            .map_err(|e| RagError::embedding(PROVIDER_NAME, e))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "object": "list",
            "data": [{"object": "embedding", "embedding": [0.1, 0.2, 0.3], "index": 0}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(extract_embedding(parsed, 3).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let parsed: EmbeddingApiResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2]}]}"#).unwrap();
        let err = extract_embedding(parsed, DEFAULT_DIMENSIONS).unwrap_err();
        assert!(err.to_string().contains("1536"));
    }

    #[test]
    fn empty_data_is_rejected() {
        let parsed: EmbeddingApiResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(extract_embedding(parsed, 3).is_err());
    }

    #[test]
    fn url_targets_embedding_deployment() {
        let e = AzureOpenAiEmbedder::new("https://x.openai.azure.com", "k", "text-embedding-3-small", "2024-10-21", 30)
            .unwrap();
        assert_eq!(
            e.url(),
            "https://x.openai.azure.com/openai/deployments/text-embedding-3-small/embeddings?api-version=2024-10-21"
        );
        assert_eq!(e.dimensions(), 1536);
        assert_eq!(e.with_dimensions(3072).dimensions(), 3072);
    }
}
