use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Aggregation applied to the corroborating numeric values of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    #[default]
    Median,
    TrimmedMean,
}

/// Byzantine aggregator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByzantineConfig {
    /// Fraction of active replicas whose reports form a quorum.
    pub quorum_fraction: f64,
    /// Numeric aggregation strategy.
    pub aggregation: AggregationKind,
    /// Fraction trimmed from each end by the trimmed-mean strategy.
    pub trim_fraction: f64,
    /// IQR multiplier for the outlier fence.
    pub iqr_multiplier: f64,
    /// Smallest distance from a quartile at which a value can be fenced.
    /// Keeps a tight or identical cluster from fencing its own members.
    pub outlier_floor: f64,
    /// Vote-collection window per claim.
    pub vote_timeout_ms: u64,
    /// Pending claims kept before the oldest is force-expired.
    pub max_pending_claims: usize,
    /// Decided claims remembered for status queries and late-vote rejection.
    pub decided_history: usize,
}

impl ByzantineConfig {
    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }
}

impl Default for ByzantineConfig {
    fn default() -> Self {
        Self {
            quorum_fraction: defaults::DEFAULT_QUORUM_FRACTION,
            aggregation: AggregationKind::default(),
            trim_fraction: defaults::DEFAULT_TRIM_FRACTION,
            iqr_multiplier: defaults::DEFAULT_IQR_MULTIPLIER,
            outlier_floor: defaults::DEFAULT_OUTLIER_FLOOR,
            vote_timeout_ms: defaults::DEFAULT_VOTE_TIMEOUT_MS,
            max_pending_claims: defaults::DEFAULT_MAX_PENDING_CLAIMS,
            decided_history: defaults::DEFAULT_DECIDED_HISTORY,
        }
    }
}
