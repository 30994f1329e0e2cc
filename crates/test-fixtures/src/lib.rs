//! Shared fixtures for Chorus tests: golden JSON loaders, record and event
//! builders with deterministic timestamps, and canned similarity providers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chorus_core::errors::EmbeddingError;
use chorus_core::models::{
    BeliefUpdate, EventPayload, KnowledgeItem, KnowledgeUpdate, MemoryAdd, TaggedEvidence,
    UniqueTag,
};
use chorus_core::traits::ISimilarityProvider;
use chorus_core::{ExperienceEvent, LogicalClock, MemoryRecord, ReplicaId};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Root directory of the test-fixtures folder.
fn fixtures_root() -> PathBuf {
    // Works from any crate in the workspace: walk up to find test-fixtures.
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let mut path = PathBuf::from(&manifest_dir);

    while !path.join("test-fixtures").exists() {
        if !path.pop() {
            panic!(
                "Could not find test-fixtures directory from CARGO_MANIFEST_DIR={}",
                manifest_dir
            );
        }
    }
    path.join("test-fixtures")
}

/// Load and deserialize a JSON fixture file.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = fixtures_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Load a fixture file as raw JSON Value.
pub fn load_fixture_value(relative_path: &str) -> serde_json::Value {
    load_fixture(relative_path)
}

/// The pinned wire-format event.
pub fn golden_event() -> ExperienceEvent {
    load_fixture("golden/experience_event.json")
}

// ── Time ────────────────────────────────────────────────────────────────────

/// Fixed origin for fixture timestamps.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn at_hours(hours: f64) -> DateTime<Utc> {
    base_time() + Duration::milliseconds((hours * 3_600_000.0) as i64)
}

// ── Builders ────────────────────────────────────────────────────────────────

/// A fresh record created `hours` after [`base_time`].
pub fn record(id: &str, content: &str, source: &str, hours: f64) -> MemoryRecord {
    MemoryRecord::new(id, content, ReplicaId::from(source), at_hours(hours))
}

fn event(origin: &str, counter: u64, payload: EventPayload) -> ExperienceEvent {
    let mut event = ExperienceEvent::new(LogicalClock::at(origin, counter), payload);
    event.event_id = Uuid::from_u128(fixture_event_seed(origin, counter));
    event.wall_time = base_time() + Duration::seconds(counter as i64);
    event
}

fn fixture_event_seed(origin: &str, counter: u64) -> u128 {
    let origin_bits = origin
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u64));
    ((origin_bits as u128) << 64) | counter as u128
}

/// A `memory_add` event from `origin` at `counter`, tagged `(origin, counter)`.
pub fn memory_event(origin: &str, counter: u64, content: &str) -> ExperienceEvent {
    let record = record(
        &format!("{origin}-mem-{counter}"),
        content,
        origin,
        counter as f64 / 3600.0,
    );
    let hash = record.content_hash();
    event(
        origin,
        counter,
        EventPayload::MemoryAdd(MemoryAdd {
            record,
            hash,
            tag: UniqueTag::new(origin, counter),
            retired: Vec::new(),
        }),
    )
}

pub fn knowledge_event(
    origin: &str,
    counter: u64,
    id: &str,
    score: f64,
    present: bool,
) -> ExperienceEvent {
    event(
        origin,
        counter,
        EventPayload::KnowledgeUpdate(KnowledgeUpdate {
            item: KnowledgeItem::new(id, format!("claim {id}"), score),
            present,
        }),
    )
}

/// A `belief_update` carrying `origin`'s absolute conviction.
pub fn belief_event(
    origin: &str,
    counter: u64,
    belief_id: &str,
    conviction: u64,
    evidence: &[&str],
) -> ExperienceEvent {
    let evidence = evidence
        .iter()
        .enumerate()
        .map(|(i, reference)| TaggedEvidence {
            reference: reference.to_string(),
            tag: UniqueTag::new(origin, counter * 1000 + i as u64 + 1),
        })
        .collect();
    event(
        origin,
        counter,
        EventPayload::BeliefUpdate(BeliefUpdate {
            belief_id: belief_id.to_string(),
            statement: format!("statement {belief_id}"),
            conviction,
            evidence,
        }),
    )
}

// ── Similarity providers ────────────────────────────────────────────────────

/// Reports the same similarity for every pair.
#[derive(Debug, Clone)]
pub struct FixedSimilarity {
    pub score: f64,
}

impl FixedSimilarity {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl ISimilarityProvider for FixedSimilarity {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![text.len() as f32, 1.0])
    }

    fn similarity(&self, _a: &[f32], _b: &[f32]) -> f64 {
        self.score
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Always fails, counting how often it was asked.
#[derive(Debug, Default)]
pub struct UnavailableSimilarity {
    pub calls: AtomicUsize,
}

impl UnavailableSimilarity {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ISimilarityProvider for UnavailableSimilarity {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EmbeddingError::ProviderUnavailable {
            provider: "unavailable".to_string(),
        })
    }

    fn similarity(&self, _a: &[f32], _b: &[f32]) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }
}
