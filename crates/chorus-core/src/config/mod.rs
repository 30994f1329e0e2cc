//! Configuration supplied to the engine at construction time.
//!
//! # Examples
//!
//! ```
//! use chorus_core::config::ChorusConfig;
//!
//! let config = ChorusConfig::from_toml("[gossip]\nfanout = 4\n").unwrap();
//! assert_eq!(config.gossip.fanout, 4);
//! assert!((config.dedup.similarity_threshold - 0.85).abs() < f64::EPSILON);
//! ```

mod byzantine_config;
mod dedup_config;
pub mod defaults;
mod gossip_config;
mod observability_config;
mod sync_config;

pub use byzantine_config::{AggregationKind, ByzantineConfig};
pub use dedup_config::{CompositeWeights, DedupConfig};
pub use gossip_config::GossipConfig;
pub use observability_config::ObservabilityConfig;
pub use sync_config::SyncConfig;

use serde::{Deserialize, Serialize};

use crate::constants::WEIGHT_SUM_TOLERANCE;
use crate::errors::{ChorusError, ChorusResult};

/// Top-level configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusConfig {
    pub sync: SyncConfig,
    pub dedup: DedupConfig,
    pub gossip: GossipConfig,
    pub byzantine: ByzantineConfig,
    pub observability: ObservabilityConfig,
}

impl ChorusConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(source: &str) -> ChorusResult<Self> {
        let config: ChorusConfig = toml::from_str(source).map_err(|e| ChorusError::ConfigError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> ChorusResult<()> {
        let dedup = &self.dedup;
        check_unit("dedup.similarity_threshold", dedup.similarity_threshold)?;
        check_unit("dedup.merge_weight", dedup.merge_weight)?;
        check_unit("dedup.same_source_score", dedup.same_source_score)?;
        check_unit("dedup.cross_source_score", dedup.cross_source_score)?;
        for (name, w) in [
            ("dedup.weights.vector", dedup.weights.vector),
            ("dedup.weights.temporal", dedup.weights.temporal),
            ("dedup.weights.tag", dedup.weights.tag),
            ("dedup.weights.source", dedup.weights.source),
        ] {
            check_unit(name, w)?;
        }
        if (dedup.weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!(
                "dedup.weights must sum to 1.0, got {:.6}",
                dedup.weights.sum()
            )));
        }
        if !(dedup.temporal_scale_hours > 0.0) {
            return Err(invalid("dedup.temporal_scale_hours must be positive"));
        }
        if dedup.max_lineage < 2 {
            return Err(invalid("dedup.max_lineage must be at least 2"));
        }
        if dedup.embedding_cache_capacity == 0 {
            return Err(invalid("dedup.embedding_cache_capacity must be non-zero"));
        }

        let gossip = &self.gossip;
        if gossip.fanout == 0 {
            return Err(invalid("gossip.fanout must be at least 1"));
        }
        if gossip.interval_ms == 0 || gossip.ack_timeout_ms == 0 {
            return Err(invalid("gossip intervals must be non-zero"));
        }
        if gossip.outbox_coalesce_threshold == 0 {
            return Err(invalid("gossip.outbox_coalesce_threshold must be non-zero"));
        }
        if gossip.outbox_capacity < gossip.outbox_coalesce_threshold {
            return Err(invalid(
                "gossip.outbox_capacity must not be below gossip.outbox_coalesce_threshold",
            ));
        }

        let byz = &self.byzantine;
        if !(byz.quorum_fraction > 0.5 && byz.quorum_fraction <= 1.0) {
            return Err(invalid(format!(
                "byzantine.quorum_fraction must be in (0.5, 1.0], got {}",
                byz.quorum_fraction
            )));
        }
        if !(0.0..0.5).contains(&byz.trim_fraction) {
            return Err(invalid("byzantine.trim_fraction must be in [0.0, 0.5)"));
        }
        if !(byz.iqr_multiplier > 0.0) {
            return Err(invalid("byzantine.iqr_multiplier must be positive"));
        }
        if !(byz.outlier_floor >= 0.0 && byz.outlier_floor.is_finite()) {
            return Err(invalid("byzantine.outlier_floor must be finite and non-negative"));
        }
        if byz.vote_timeout_ms == 0 || byz.max_pending_claims == 0 {
            return Err(invalid(
                "byzantine.vote_timeout_ms and max_pending_claims must be non-zero",
            ));
        }

        let sync = &self.sync;
        if sync.replica_id.trim().is_empty() {
            return Err(invalid("sync.replica_id must not be empty"));
        }
        if sync.causal_buffer_capacity == 0 {
            return Err(invalid("sync.causal_buffer_capacity must be non-zero"));
        }
        if sync.require_signatures && sync.signing_key.is_none() {
            return Err(invalid(
                "sync.require_signatures is set but no sync.signing_key is configured",
            ));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> ChorusResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be in [0.0, 1.0], got {value}")))
    }
}

fn invalid(reason: impl Into<String>) -> ChorusError {
    ChorusError::ConfigError {
        reason: reason.into(),
    }
}
