//! Embedding service trait and the built-in feature-hashing embedder.
//!
//! Model-backed embedders plug in by implementing [`EmbeddingService`];
//! [`HashingEmbedding`] needs no model and maps each token to a signed
//! bucket, so texts sharing vocabulary score close under cosine similarity.
//! Buckets come from blake3, so persisted vectors stay valid across builds.

use crate::error::IndexError;
use crate::store::EmbedderInfo;

/// Service for generating text embeddings.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, IndexError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the embedding scheme, stored with the index.
    fn model_id(&self) -> &str;

    /// Whether `text` carries anything this service can embed.
    fn has_tokens(&self, text: &str) -> bool {
        !text.trim().is_empty()
    }

    fn info(&self) -> EmbedderInfo {
        EmbedderInfo::new(self.model_id(), self.dimensions())
    }
}

/// Deterministic bag-of-words embedder using the hashing trick.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];
        for token in Self::tokens(text) {
            let digest = blake3::hash(token.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest.as_bytes()[..8]);
            let h = u64::from_le_bytes(head);
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            result[bucket] += sign;
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        if Self::tokens(text).next().is_none() {
            return Err(IndexError::Query("Cannot embed text without tokens".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "hashing-blake3-v1"
    }

    fn has_tokens(&self, text: &str) -> bool {
        Self::tokens(text).next().is_some()
    }
}
