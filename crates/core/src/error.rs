//! Error types for the Paragraf domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Vendor transport
//! failures are described by [`ProviderError`]; every pipeline stage surfaces
//! its failure as one distinct [`RagError`] kind.

use thiserror::Error;

/// The top-level error type for all pipeline operations.
///
/// Each stage fails fast with exactly one of these kinds. Nothing in the
/// pipeline catches, retries or downgrades them.
#[derive(Debug, Error)]
pub enum RagError {
    // --- Embedding ---
    #[error("Embedding failed ({provider}): {source}")]
    Embedding {
        provider: String,
        #[source]
        source: ProviderError,
    },

    // --- Retrieval ---
    #[error("Retrieval failed ({backend}): {message}")]
    Retrieval { backend: String, message: String },

    #[error("Backend connectivity failure: {0}")]
    Connectivity(String),

    // --- Generation ---
    #[error("Generation failed ({provider}): {source}")]
    Generation {
        provider: String,
        #[source]
        source: ProviderError,
    },

    // --- Configuration ---
    #[error("Unsupported LLM provider: '{0}'")]
    UnsupportedProvider(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Wrap a vendor failure raised while embedding.
    pub fn embedding(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Embedding {
            provider: provider.into(),
            source,
        }
    }

    /// Wrap a vendor failure raised while generating.
    pub fn generation(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Generation {
            provider: provider.into(),
            source,
        }
    }

    /// Build a retrieval failure for the named backend.
    pub fn retrieval(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable label for the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embedding { .. } => "embedding",
            Self::Retrieval { .. } => "retrieval",
            Self::Connectivity(_) => "connectivity",
            Self::Generation { .. } => "generation",
            Self::UnsupportedProvider(_) => "unsupported_provider",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias using [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;

// --- Vendor transport errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
