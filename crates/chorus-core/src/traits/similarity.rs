use crate::errors::EmbeddingError;

/// Embedding/similarity provider.
pub trait ISimilarityProvider: Send + Sync {
    /// Embed a single text, returning a vector of floats.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Similarity of two embeddings in [0, 1].
    fn similarity(&self, a: &[f32], b: &[f32]) -> f64;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider is currently available.
    fn is_available(&self) -> bool {
        true
    }
}
