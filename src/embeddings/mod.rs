//! Embedding generation and similarity scoring.
//!
//! This module provides:
//! - The [`EmbeddingProvider`] trait abstracting the text-to-vector model
//! - A deterministic local provider and an always-unavailable null provider
//! - Cosine similarity with explicit zero-magnitude guards
//! - The little-endian f32 blob codec used for stored vectors

mod provider;
mod similarity;

pub use provider::{EmbeddingProvider, HashEmbedding, NullEmbedding};
pub use similarity::{cosine_similarity, decode_embedding, encode_embedding};

/// Vector dimension for embeddings.
/// Matches the 384 dimensions of the MiniLM family of sentence encoders.
pub const EMBEDDING_DIM: usize = 384;
