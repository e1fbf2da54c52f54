//! Embedding provider implementations.
//!
//! The provider is a black box mapping text to a fixed-length vector. It is
//! deliberately infallible at the call site: a provider that cannot produce
//! a vector returns `None`, and the store degrades to keyword-only search.

use super::EMBEDDING_DIM;

/// Text-to-vector model abstraction.
///
/// Implementations must never panic; model failures are logged by the
/// implementation and reported as `None`.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for the given text, or `None` if the provider
    /// is unavailable or failed.
    fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Whether this provider can produce embeddings at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Short provider name for logging.
    fn name(&self) -> &'static str;
}

/// Deterministic bag-of-tokens embedding.
///
/// Each lowercased alphanumeric token is expanded into a unit vector seeded
/// by its hash, the token vectors are summed and the result L2-normalized.
/// Texts sharing tokens score high cosine similarity; disjoint texts score
/// near zero. Deterministic across runs and platforms, so stored vectors
/// stay comparable without shipping a model file.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashEmbedding;

impl HashEmbedding {
    /// Create a new hash-based provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generate a deterministic unit vector for a single token.
    #[allow(clippy::cast_precision_loss)]
    fn token_vector(token: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let hash = hasher.finish();

        let mut vector = Vec::with_capacity(EMBEDDING_DIM);
        let mut seed = hash;
        for _ in 0..EMBEDDING_DIM {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let value = (((seed >> 33) as f32) / (u32::MAX as f32)).mul_add(2.0, -1.0);
            vector.push(value);
        }

        normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashEmbedding {
    fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut embedding = vec![0.0f32; EMBEDDING_DIM];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            for (slot, value) in embedding.iter_mut().zip(Self::token_vector(&token)) {
                *slot += value;
            }
            tokens += 1;
        }

        if tokens == 0 {
            tracing::trace!("embedding empty text produced the zero vector");
        }
        normalize(&mut embedding);
        Some(embedding)
    }

    fn name(&self) -> &'static str {
        "hash-embedding"
    }
}

/// Provider used when no embedding model could be loaded.
///
/// Always reports itself unavailable; search runs keyword-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmbedding;

impl NullEmbedding {
    /// Create a new null provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EmbeddingProvider for NullEmbedding {
    fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "null-embedding"
    }
}

/// L2-normalize a vector in place. Leaves the zero vector untouched.
fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
