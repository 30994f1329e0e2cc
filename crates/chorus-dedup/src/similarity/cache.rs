//! Bounded cache of provider embeddings, keyed by content hash.

use std::time::Duration;

use chorus_core::models::ContentHash;
use moka::sync::Cache;

pub struct EmbeddingCache {
    cache: Cache<ContentHash, Vec<f32>>,
}

impl EmbeddingCache {
    /// Cache holding at most `max_entries` embeddings.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_idle(Duration::from_secs(3600))
            .build();
        Self { cache }
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Vec<f32>> {
        self.cache.get(hash)
    }

    pub fn insert(&self, hash: ContentHash, embedding: Vec<f32>) {
        self.cache.insert(hash, embedding);
    }

    /// Entry count once pending evictions have run.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_the_stored_vector() {
        let cache = EmbeddingCache::new(8);
        cache.insert("h1".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get(&"h1".to_string()), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get(&"h2".to_string()), None);
    }

    #[test]
    fn entry_count_stays_within_capacity() {
        let cache = EmbeddingCache::new(4);
        for i in 0..64 {
            cache.insert(format!("h{i}"), vec![i as f32]);
        }
        assert!(cache.len() <= 4);
    }

    #[test]
    fn clear_drops_every_entry() {
        let cache = EmbeddingCache::new(8);
        cache.insert("a".to_string(), vec![1.0]);
        cache.clear();
        assert_eq!(cache.get(&"a".to_string()), None);
    }
}
