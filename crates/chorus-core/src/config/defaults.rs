//! Default values for every tunable in [`super::ChorusConfig`].

// Deduplicator
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MERGE_WEIGHT: f64 = 0.6;
pub const DEFAULT_MAX_LINEAGE: usize = 16;
pub const DEFAULT_EMBEDDING_CACHE_CAPACITY: u64 = 10_000;
pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.5;
pub const DEFAULT_TEMPORAL_WEIGHT: f64 = 0.2;
pub const DEFAULT_TAG_WEIGHT: f64 = 0.2;
pub const DEFAULT_SOURCE_WEIGHT: f64 = 0.1;
pub const DEFAULT_TEMPORAL_SCALE_HOURS: f64 = 24.0;
pub const DEFAULT_SAME_SOURCE_SCORE: f64 = 1.0;
pub const DEFAULT_CROSS_SOURCE_SCORE: f64 = 0.5;

// Gossip
pub const DEFAULT_FANOUT: usize = 3;
pub const DEFAULT_GOSSIP_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_OUTBOX_COALESCE_THRESHOLD: usize = 64;
pub const DEFAULT_OUTBOX_CAPACITY: usize = 4_096;
pub const DEFAULT_ANTI_ENTROPY_INTERVAL_ROUNDS: u64 = 8;

// Byzantine
pub const DEFAULT_QUORUM_FRACTION: f64 = 2.0 / 3.0;
pub const DEFAULT_TRIM_FRACTION: f64 = 0.2;
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_OUTLIER_FLOOR: f64 = 0.05;
pub const DEFAULT_VOTE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_PENDING_CLAIMS: usize = 1_024;
pub const DEFAULT_DECIDED_HISTORY: usize = 4_096;

// Sync
pub const DEFAULT_REPLICA_ID: &str = "replica-local";
pub const DEFAULT_CAUSAL_BUFFER_CAPACITY: usize = 4_096;
pub const DEFAULT_BACKLOG_CAPACITY: usize = 4_096;
pub const DEFAULT_SELF_CHECK_INTERVAL_ROUNDS: u64 = 16;

// Observability
pub const DEFAULT_LOG_LEVEL: &str = "info";
