//! Vector retriever implementations for Paragraf.
//!
//! All retrievers implement `paragraf_core::Retriever` and return chunks in
//! non-increasing similarity order.

pub mod in_memory;
pub mod vector;

#[cfg(feature = "postgres")]
pub mod pgvector;

pub use in_memory::{InMemoryRetriever, StoredChunk};
pub use vector::{cosine_similarity, rank_by_similarity};

#[cfg(feature = "postgres")]
pub use pgvector::PgVectorRetriever;
