//! Azure OpenAI chat-completions provider.
//!
//! Talks to `{endpoint}/openai/deployments/{deployment}/chat/completions`
//! with an `api-key` header. The deployment name selects the model.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Native `system` role, so messages pass through unchanged

use async_trait::async_trait;
use paragraf_config::AzureConfig;
use paragraf_core::error::{ProviderError, RagError, Result};
use paragraf_core::message::RoleMessage;
use paragraf_core::provider::{FragmentStream, GenerationParams, GenerationProvider};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;
use crate::sse::{self, SseStep};

const PROVIDER_NAME: &str = "azure";

/// Fragments buffered between the SSE task and the consumer.
const STREAM_BUFFER: usize = 64;

/// A chat provider backed by an Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    /// Create a new provider for one chat deployment.
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
            client: http::build_client(timeout_secs)?,
        })
    }

    /// Build from the `[azure]` config section, requiring endpoint and key.
    pub fn from_config(config: &AzureConfig) -> Result<Self> {
        let (endpoint, api_key) = credentials(config)?;
        Self::new(
            endpoint,
            api_key,
            &config.chat_deployment,
            &config.api_version,
            config.timeout_secs,
        )
        .map_err(|e| RagError::Config(e.to_string()))
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// Convert our messages to the chat-completions wire format.
    fn to_api_messages(messages: &[RoleMessage]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect()
    }

    fn request_body(messages: &[RoleMessage], params: &GenerationParams, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "messages": Self::to_api_messages(messages),
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": stream,
        })
    }

    async fn post(&self, body: &serde_json::Value, stream: bool) -> std::result::Result<reqwest::Response, ProviderError> {
        let mut request = self
            .client
            .post(self.chat_url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json");
        if stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request.json(body).send().await.map_err(http::transport_error)?;
        http::check_status(PROVIDER_NAME, response).await
    }

    async fn complete(&self, messages: &[RoleMessage], params: &GenerationParams) -> std::result::Result<String, ProviderError> {
        let body = Self::request_body(messages, params, false);

        debug!(provider = PROVIDER_NAME, deployment = %self.deployment, messages = messages.len(), "Sending completion request");

        let response = self.post(&body, false).await?;
        let api_response: ApiResponse = http::read_json(response).await?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Endpoint and key from the `[azure]` section, or a configuration error.
pub(crate) fn credentials(config: &AzureConfig) -> Result<(&str, &str)> {
    let endpoint = config
        .endpoint
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RagError::Config("azure.endpoint (AZURE_OPENAI_ENDPOINT) is not set".into()))?;
    let api_key = config
        .api_key
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RagError::Config("azure.api_key (AZURE_OPENAI_API_KEY) is not set".into()))?;
    Ok((endpoint, api_key))
}

#[async_trait]
impl GenerationProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.deployment
    }

    async fn generate(&self, messages: &[RoleMessage], params: &GenerationParams) -> Result<String> {
        self.complete(messages, params)
            .await
            .map_err(|e| RagError::generation(PROVIDER_NAME, e))
    }

    async fn generate_stream(
        &self,
        messages: &[RoleMessage],
        params: &GenerationParams,
    ) -> Result<FragmentStream> {
        let body = Self::request_body(messages, params, true);

        debug!(provider = PROVIDER_NAME, deployment = %self.deployment, messages = messages.len(), "Sending streaming request");

        let response = self
            .post(&body, true)
            .await
            .map_err(|e| RagError::generation(PROVIDER_NAME, e))?;

        let (sender, stream) = FragmentStream::channel(PROVIDER_NAME, STREAM_BUFFER);
        sse::spawn_pump(PROVIDER_NAME.to_string(), response, sender, parse_stream_payload);
        Ok(stream)
    }
}

/// Parse one `data:` payload of a chat-completions stream.
fn parse_stream_payload(data: &str) -> std::result::Result<SseStep, ProviderError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseStep::Done);
    }

    let chunk: StreamResponse = serde_json::from_str(data)
        .map_err(|e| ProviderError::InvalidResponse(format!("Malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::ApiError {
            status_code: 200,
            message: error.message,
        });
    }

    // Azure sends a leading chunk with prompt filter results and no choices
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(SseStep::Skip);
    };

    Ok(SseStep::Delta {
        text: choice.delta.content.unwrap_or_default(),
        finished: choice.finish_reason.is_some(),
    })
}

// --- Azure OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AzureOpenAiProvider {
        AzureOpenAiProvider::new(
            "https://legal.openai.azure.com/",
            "key",
            "gpt-4o-mini",
            "2024-10-21",
            30,
        )
        .unwrap()
    }

    #[test]
    fn chat_url_includes_deployment_and_version() {
        let url = provider().chat_url();
        assert_eq!(
            url,
            "https://legal.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-10-21"
        );
    }

    #[test]
    fn request_body_keeps_roles_and_params() {
        let messages = vec![
            RoleMessage::system("Du bist ein Assistent."),
            RoleMessage::user("Was regelt § 823 BGB?"),
        ];
        let params = GenerationParams {
            temperature: 0.3,
            max_tokens: 512,
        };
        let body = AzureOpenAiProvider::request_body(&messages, &params, true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Was regelt § 823 BGB?");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn from_config_requires_credentials() {
        let config = AzureConfig::default();
        assert!(matches!(
            AzureOpenAiProvider::from_config(&config),
            Err(RagError::Config(_))
        ));

        let config = AzureConfig {
            endpoint: Some("https://x.openai.azure.com".into()),
            api_key: Some("k".into()),
            ..AzureConfig::default()
        };
        let provider = AzureOpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "azure");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let step = parse_stream_payload(r#"{"choices":[{"delta":{"content":"Hallo"},"finish_reason":null}]}"#).unwrap();
        assert_eq!(
            step,
            SseStep::Delta {
                text: "Hallo".into(),
                finished: false
            }
        );
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let step = parse_stream_payload(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(
            step,
            SseStep::Delta {
                text: String::new(),
                finished: true
            }
        );
    }

    #[test]
    fn parse_prompt_filter_chunk_is_skipped() {
        let step = parse_stream_payload(r#"{"choices":[],"prompt_filter_results":[{"prompt_index":0}]}"#).unwrap();
        assert_eq!(step, SseStep::Skip);
    }

    #[test]
    fn parse_done_sentinel() {
        assert_eq!(parse_stream_payload("[DONE]").unwrap(), SseStep::Done);
    }

    #[test]
    fn parse_error_payload_fails_stream() {
        let err = parse_stream_payload(r#"{"error":{"message":"content filtered"}}"#).unwrap_err();
        assert!(err.to_string().contains("content filtered"));
        assert!(parse_stream_payload("{not json").is_err());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Antwort"},"finish_reason":"stop"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Antwort"));
    }
}
