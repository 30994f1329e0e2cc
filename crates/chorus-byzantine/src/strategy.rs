//! Numeric aggregation strategies applied to the fenced values of a claim.

use chorus_core::config::{AggregationKind, ByzantineConfig};

use crate::outliers::{percentile, sorted};

pub trait AggregationStrategy: Send + Sync {
    /// Aggregate of `values`, or `None` when there is nothing to aggregate.
    fn aggregate(&self, values: &[f64]) -> Option<f64>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl AggregationStrategy for Median {
    fn aggregate(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(percentile(&sorted(values), 50.0))
    }

    fn name(&self) -> &'static str {
        "median"
    }
}

/// Mean after dropping `floor(n · trim)` values from each end. Falls back to
/// the median when trimming would leave nothing.
#[derive(Debug, Clone, Copy)]
pub struct TrimmedMean {
    pub trim: f64,
}

impl AggregationStrategy for TrimmedMean {
    fn aggregate(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let sorted = sorted(values);
        let cut = (sorted.len() as f64 * self.trim.clamp(0.0, 0.5)).floor() as usize;
        if 2 * cut >= sorted.len() {
            return Median.aggregate(values);
        }
        let kept = &sorted[cut..sorted.len() - cut];
        Some(kept.iter().sum::<f64>() / kept.len() as f64)
    }

    fn name(&self) -> &'static str {
        "trimmed_mean"
    }
}

pub fn strategy_for(config: &ByzantineConfig) -> Box<dyn AggregationStrategy> {
    match config.aggregation {
        AggregationKind::Median => Box::new(Median),
        AggregationKind::TrimmedMean => Box::new(TrimmedMean {
            trim: config.trim_fraction,
        }),
    }
}
