//! Similarity with graceful degradation.
//!
//! Chain: injected provider → lexical token overlap. Falling back logs a
//! warning and publishes a [`DegradationEvent`] once per outage; the first
//! successful provider call afterwards ends the outage.

use std::sync::Arc;

use chorus_core::config::defaults::DEFAULT_EMBEDDING_CACHE_CAPACITY;
use chorus_core::constants::{LEXICAL_FALLBACK, SIMILARITY_COMPONENT};
use chorus_core::errors::EmbeddingError;
use chorus_core::models::{content_hash, DegradationEvent, Observation, SyncRecord};
use chorus_core::traits::{IEventSink, ISimilarityProvider, NoopSink};
use chrono::Utc;
use tracing::{info, warn};

use super::{cosine_similarity, lexical_similarity, EmbeddingCache};

pub struct SimilarityEngine {
    provider: Option<Arc<dyn ISimilarityProvider>>,
    sink: Arc<dyn IEventSink>,
    /// Embeddings computed for observations that arrived without one.
    embeddings: EmbeddingCache,
    degraded: bool,
    events: Vec<DegradationEvent>,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::lexical()
    }
}

impl SimilarityEngine {
    pub fn new(provider: Arc<dyn ISimilarityProvider>, sink: Arc<dyn IEventSink>) -> Self {
        Self {
            provider: Some(provider),
            sink,
            embeddings: EmbeddingCache::new(DEFAULT_EMBEDDING_CACHE_CAPACITY),
            degraded: false,
            events: Vec::new(),
        }
    }

    /// Engine without a provider: embeddings carried by records are compared
    /// by cosine, everything else lexically.
    pub fn lexical() -> Self {
        Self {
            provider: None,
            sink: Arc::new(NoopSink),
            embeddings: EmbeddingCache::new(DEFAULT_EMBEDDING_CACHE_CAPACITY),
            degraded: false,
            events: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn IEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Keep at most `capacity` provider embeddings.
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.embeddings = EmbeddingCache::new(capacity);
        self
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.embeddings
    }

    /// Whether the last comparison had to fall back.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Degradation events recorded so far.
    pub fn events(&self) -> &[DegradationEvent] {
        &self.events
    }

    /// Vector similarity of two observations in [0, 1].
    pub fn similarity(&mut self, a: &Observation, b: &Observation) -> f64 {
        let Some(provider) = self.provider.clone() else {
            return match (&a.embedding, &b.embedding) {
                (Some(ea), Some(eb)) => cosine_similarity(ea, eb).max(0.0),
                _ => lexical_similarity(&a.content, &b.content),
            };
        };

        let embedded = self
            .embedding_for(provider.as_ref(), a)
            .and_then(|ea| Ok((ea, self.embedding_for(provider.as_ref(), b)?)));
        match embedded {
            Ok((ea, eb)) => {
                if self.degraded {
                    info!(provider = provider.name(), "similarity provider recovered");
                    self.degraded = false;
                }
                provider.similarity(&ea, &eb).clamp(0.0, 1.0)
            }
            Err(e) => {
                self.degrade(provider.name(), &e);
                lexical_similarity(&a.content, &b.content)
            }
        }
    }

    fn embedding_for(
        &mut self,
        provider: &dyn ISimilarityProvider,
        obs: &Observation,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(embedding) = &obs.embedding {
            return Ok(embedding.clone());
        }
        if !provider.is_available() {
            return Err(EmbeddingError::ProviderUnavailable {
                provider: provider.name().to_string(),
            });
        }
        let key = content_hash(&obs.content);
        if let Some(cached) = self.embeddings.get(&key) {
            return Ok(cached.clone());
        }
        let embedding = provider.embed(&obs.content)?;
        self.embeddings.insert(key, embedding.clone());
        Ok(embedding)
    }

    fn degrade(&mut self, provider: &str, error: &EmbeddingError) {
        if self.degraded {
            return;
        }
        self.degraded = true;
        warn!(
            provider,
            error = %error,
            fallback = LEXICAL_FALLBACK,
            "similarity provider unavailable, falling back to lexical overlap"
        );
        let event = DegradationEvent {
            component: SIMILARITY_COMPONENT.to_string(),
            failure: error.to_string(),
            fallback_used: LEXICAL_FALLBACK.to_string(),
            timestamp: Utc::now(),
        };
        self.events.push(event.clone());
        self.sink.publish(SyncRecord::Degradation(event));
    }
}
