//! # Paragraf Core
//!
//! Domain types, capability traits, and error definitions for the Paragraf
//! legal RAG pipeline. This crate has **no I/O dependencies**: it defines the
//! model that every other crate implements against.
//!
//! ## Capabilities
//!
//! The pipeline consumes three traits, each implemented in its own crate:
//! - [`Embedder`]: query text to vector
//! - [`Retriever`]: vector to ranked [`DocumentChunk`]s
//! - [`GenerationProvider`]: role-tagged messages to an answer or a stream
//!
//! Tests swap any of them for in-process fakes.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod message;
pub mod provider;
pub mod retriever;

// Re-export key types at crate root for ergonomics
pub use chunk::{DocumentChunk, MetadataFilter};
pub use embedding::Embedder;
pub use error::{ProviderError, RagError, Result};
pub use message::{ConversationMessage, ConversationRole, Role, RoleMessage};
pub use provider::{FragmentSender, FragmentStream, GenerationParams, GenerationProvider, StreamEvent};
pub use retriever::{Retriever, SearchParams};
