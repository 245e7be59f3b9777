//! Google Gemini provider (Generative Language REST API).
//!
//! Gemini has no `system` chat role. System messages are folded into the
//! request's `systemInstruction`, `assistant` turns become `model` turns, and
//! the trailing user message is sent as the live turn after the prior
//! history, exactly once.

use async_trait::async_trait;
use paragraf_config::GeminiConfig;
use paragraf_core::error::{ProviderError, RagError, Result};
use paragraf_core::message::{Role, RoleMessage};
use paragraf_core::provider::{FragmentStream, GenerationParams, GenerationProvider};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;
use crate::sse::{self, SseStep};

const PROVIDER_NAME: &str = "gemini";

/// Fragments buffered between the SSE task and the consumer.
const STREAM_BUFFER: usize = 64;

/// A chat provider backed by the Gemini `generateContent` API.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

/// A message sequence split the way Gemini wants it.
#[derive(Debug, Clone, PartialEq)]
struct GeminiConversation {
    /// All system messages joined with blank lines
    system: Option<String>,
    /// Every turn before the live one
    history: Vec<Content>,
    /// The trailing user message, if the sequence ends with one
    live_turn: Option<String>,
}

impl GeminiConversation {
    fn from_messages(messages: &[RoleMessage]) -> Self {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut turns: Vec<&RoleMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User | Role::Assistant => turns.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        // Only a trailing user message is live; it is removed from history
        let live_turn = if turns.last().is_some_and(|m| m.role == Role::User) {
            turns.pop().map(|m| m.content.clone())
        } else {
            None
        };

        let history = turns.into_iter().map(|m| Content::text(gemini_role(m.role), &m.content)).collect();

        Self {
            system,
            history,
            live_turn,
        }
    }

    /// The `contents` array: history followed by the live turn.
    fn contents(&self) -> Vec<Content> {
        let mut contents = self.history.clone();
        if let Some(live) = &self.live_turn {
            contents.push(Content::text("user", live));
        }
        contents
    }
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

impl GeminiProvider {
    /// Create a new provider for one model.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> std::result::Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::build_client(timeout_secs)?,
        })
    }

    /// Build from the `[gemini]` config section, requiring an API key.
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RagError::Config("gemini.api_key (GOOGLE_API_KEY) is not set".into()))?;
        Self::new(&config.base_url, api_key, &config.model, config.timeout_secs)
            .map_err(|e| RagError::Config(e.to_string()))
    }

    fn url(&self, stream: bool) -> String {
        if stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model)
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model)
        }
    }

    fn request_body(messages: &[RoleMessage], params: &GenerationParams) -> GenerateRequest {
        let conversation = GeminiConversation::from_messages(messages);
        GenerateRequest {
            system_instruction: conversation.system.as_deref().map(|s| Content {
                role: None,
                parts: vec![Part { text: s.to_string() }],
            }),
            contents: conversation.contents(),
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            },
        }
    }

    async fn post(&self, body: &GenerateRequest, stream: bool) -> std::result::Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.url(stream))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(http::transport_error)?;
        http::check_status(PROVIDER_NAME, response).await
    }

    async fn complete(&self, messages: &[RoleMessage], params: &GenerationParams) -> std::result::Result<String, ProviderError> {
        let body = Self::request_body(messages, params);

        debug!(provider = PROVIDER_NAME, model = %self.model, turns = body.contents.len(), "Sending completion request");

        let response = self.post(&body, false).await?;
        let api_response: GenerateResponse = http::read_json(response).await?;
        api_response.into_text()
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
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
        let body = Self::request_body(messages, params);

        debug!(provider = PROVIDER_NAME, model = %self.model, turns = body.contents.len(), "Sending streaming request");

        let response = self
            .post(&body, true)
            .await
            .map_err(|e| RagError::generation(PROVIDER_NAME, e))?;

        let (sender, stream) = FragmentStream::channel(PROVIDER_NAME, STREAM_BUFFER);
        sse::spawn_pump(PROVIDER_NAME.to_string(), response, sender, parse_stream_payload);
        Ok(stream)
    }
}

/// Parse one `data:` payload of a `streamGenerateContent?alt=sse` body.
/// Each payload is a full `GenerateContentResponse` carrying a text delta.
fn parse_stream_payload(data: &str) -> std::result::Result<SseStep, ProviderError> {
    let chunk: GenerateResponse = serde_json::from_str(data)
        .map_err(|e| ProviderError::InvalidResponse(format!("Malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(error.into());
    }
    if let Some(reason) = chunk.block_reason() {
        return Err(ProviderError::InvalidResponse(format!("Prompt blocked: {reason}")));
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(SseStep::Skip);
    };

    Ok(SseStep::Delta {
        text: candidate.text(),
        finished: candidate.finish_reason.is_some(),
    })
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

impl GenerateResponse {
    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref())
    }

    fn into_text(self) -> std::result::Result<String, ProviderError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        if let Some(reason) = self.block_reason() {
            return Err(ProviderError::InvalidResponse(format!("Prompt blocked: {reason}")));
        }
        self.candidates
            .into_iter()
            .next()
            .map(|c| c.text())
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl From<ApiErrorBody> for ProviderError {
    fn from(e: ApiErrorBody) -> Self {
        ProviderError::ApiError {
            status_code: e.code,
            message: e.message,
        }
    }
}
