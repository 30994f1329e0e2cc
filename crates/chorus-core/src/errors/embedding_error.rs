/// Embedding / similarity provider errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("similarity provider unavailable: {provider}")]
    ProviderUnavailable { provider: String },

    #[error("embedding inference failed: {reason}")]
    InferenceFailed { reason: String },
}
