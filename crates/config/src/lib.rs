//! Configuration loading, validation, and management for Paragraf.
//!
//! Loads configuration from `~/.paragraf/config.toml` (or the file named by
//! `PARAGRAF_CONFIG`) with environment variable overrides. Validates all
//! settings at startup; nothing is re-read while requests are served.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Generation backends the provider factory knows how to build.
pub const SUPPORTED_PROVIDERS: &[&str] = &["azure", "gemini"];

/// The root configuration structure.
///
/// Maps directly to `~/.paragraf/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Selected generation backend ("azure" or "gemini")
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,

    /// Fallback log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deployment environment label, attached to startup logs
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Vector store connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Azure OpenAI (chat + embeddings)
    #[serde(default)]
    pub azure: AzureConfig,

    /// Google Gemini (chat)
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Retrieval and generation defaults
    #[serde(default)]
    pub rag: RagConfig,
}

fn default_llm_provider() -> String {
    "azure".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_environment() -> String {
    "development".into()
}
fn default_timeout_secs() -> u64 {
    120
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("llm_provider", &self.llm_provider)
            .field("log_level", &self.log_level)
            .field("environment", &self.environment)
            .field("database", &self.database)
            .field("azure", &self.azure)
            .field("gemini", &self.gemini)
            .field("rag", &self.rag)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string (contains credentials)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Table holding `id, content, metadata, embedding vector(1536)`
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_table() -> String {
    "documents2".into()
}
fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            table: default_table(),
            max_connections: default_max_connections(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &redact(&self.url))
            .field("table", &self.table)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_embedding_deployment")]
    pub embedding_deployment: String,

    #[serde(default = "default_chat_deployment")]
    pub chat_deployment: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    "2024-10-21".into()
}
fn default_embedding_deployment() -> String {
    "text-embedding-3-small".into()
}
fn default_chat_deployment() -> String {
    "gpt-4o-mini".into()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            api_version: default_api_version(),
            embedding_deployment: default_embedding_deployment(),
            chat_deployment: default_chat_deployment(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("embedding_deployment", &self.embedding_deployment)
            .field("chat_deployment", &self.chat_deployment)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunks retrieved when the caller gives no `top_k`
    #[serde(default = "default_top_k")]
    pub retrieval_top_k: usize,

    /// Similarity floor when the caller gives no threshold
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Token budget for assembled context blocks
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Most recent history turns kept in the prompt
    #[serde(default = "default_max_conversation_turns")]
    pub max_conversation_turns: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_top_k() -> usize {
    8
}
fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_max_context_tokens() -> usize {
    6000
}
fn default_max_conversation_turns() -> usize {
    10
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2048
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            max_context_tokens: default_max_context_tokens(),
            max_conversation_turns: default_max_conversation_turns(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location with env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file path, then apply process
    /// environment overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without env overrides or validation.
    /// A missing file yields the defaults.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests away from the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LLM_PROVIDER") {
            self.llm_provider = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database.url = Some(v);
        }

        if let Some(v) = get("AZURE_OPENAI_API_KEY") {
            self.azure.api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.azure.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.azure.api_version = v;
        }
        if let Some(v) = get("AZURE_OPENAI_EMBEDDING_DEPLOYMENT") {
            self.azure.embedding_deployment = v;
        }
        if let Some(v) = get("AZURE_OPENAI_CHAT_DEPLOYMENT") {
            self.azure.chat_deployment = v;
        }
        if let Some(v) = get("GOOGLE_API_KEY") {
            self.gemini.api_key = Some(v);
        }

        if let Some(v) = get("RETRIEVAL_TOP_K") {
            self.rag.retrieval_top_k = parse_env("RETRIEVAL_TOP_K", &v)?;
        }
        if let Some(v) = get("SIMILARITY_THRESHOLD") {
            self.rag.similarity_threshold = parse_env("SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MAX_CONTEXT_TOKENS") {
            self.rag.max_context_tokens = parse_env("MAX_CONTEXT_TOKENS", &v)?;
        }
        if let Some(v) = get("MAX_CONVERSATION_TURNS") {
            self.rag.max_conversation_turns = parse_env("MAX_CONVERSATION_TURNS", &v)?;
        }

        Ok(())
    }

    /// Path of the active config file: `PARAGRAF_CONFIG` or the default.
    pub fn config_path() -> PathBuf {
        std::env::var("PARAGRAF_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"))
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".paragraf")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.llm_provider.to_ascii_lowercase();
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "llm_provider '{}' is not one of: {}",
                self.llm_provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        if !(1..=50).contains(&self.rag.retrieval_top_k) {
            return Err(ConfigError::ValidationError(
                "rag.retrieval_top_k must be between 1 and 50".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "rag.similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.rag.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "rag.max_context_tokens must be > 0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.rag.temperature) {
            return Err(ConfigError::ValidationError(
                "rag.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.rag.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "rag.max_tokens must be > 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_provider: default_llm_provider(),
            log_level: default_log_level(),
            environment: default_environment(),
            database: DatabaseConfig::default(),
            azure: AzureConfig::default(),
            gemini: GeminiConfig::default(),
            rag: RagConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} has an invalid value: '{raw}'"))
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.llm_provider, "azure");
        assert_eq!(config.rag.retrieval_top_k, 8);
        assert!((config.rag.similarity_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.rag.max_context_tokens, 6000);
        assert_eq!(config.rag.max_conversation_turns, 10);
        assert_eq!(config.database.table, "documents2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm_provider, config.llm_provider);
        assert_eq!(parsed.azure.chat_deployment, config.azure.chat_deployment);
        assert_eq!(parsed.gemini.model, config.gemini.model);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
llm_provider = "gemini"

[rag]
retrieval_top_k = 4
"#,
        )
        .unwrap();
        assert_eq!(config.llm_provider, "gemini");
        assert_eq!(config.rag.retrieval_top_k, 4);
        assert_eq!(config.rag.max_context_tokens, 6000);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.rag.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.rag.retrieval_top_k = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.rag.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.llm_provider = "cohere".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cohere"));
    }

    #[test]
    fn provider_check_is_case_insensitive() {
        let config = AppConfig {
            llm_provider: "Gemini".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("LLM_PROVIDER", "gemini"),
                ("GOOGLE_API_KEY", "g-key"),
                ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
                ("DATABASE_URL", "postgres://localhost/legal"),
                ("RETRIEVAL_TOP_K", "12"),
                ("SIMILARITY_THRESHOLD", "0.5"),
                ("MAX_CONVERSATION_TURNS", "4"),
                ("LOG_LEVEL", ""),
            ]))
            .unwrap();
        assert_eq!(config.llm_provider, "gemini");
        assert_eq!(config.gemini.api_key.as_deref(), Some("g-key"));
        assert_eq!(
            config.azure.endpoint.as_deref(),
            Some("https://example.openai.azure.com")
        );
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/legal"));
        assert_eq!(config.rag.retrieval_top_k, 12);
        assert!((config.rag.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.rag.max_conversation_turns, 4);
        // blank values are ignored
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn malformed_numeric_env_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("MAX_CONTEXT_TOKENS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_CONTEXT_TOKENS"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::read_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.llm_provider, "azure");
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
llm_provider = "gemini"

[database]
table = "urteile"
"#,
        )
        .unwrap();
        let config = AppConfig::read_file(&path).unwrap();
        assert_eq!(config.llm_provider, "gemini");
        assert_eq!(config.database.table, "urteile");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "llm_provider = [").unwrap();
        assert!(matches!(
            AppConfig::read_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.azure.api_key = Some("super-secret".into());
        config.gemini.api_key = Some("other-secret".into());
        config.database.url = Some("postgres://user:pw@host/db".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("other-secret"));
        assert!(!debug.contains("pw@host"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("documents2"));
        assert!(toml_str.contains("max_context_tokens = 6000"));
    }
}
