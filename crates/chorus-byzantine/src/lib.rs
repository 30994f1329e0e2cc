//! # chorus-byzantine
//!
//! Gates promotion into the confirmed tier on corroboration from a quorum
//! of replicas. Numeric claims are fenced with an IQR filter and then
//! aggregated (median or trimmed mean); presence claims take the majority.
//!
//! Claim lifecycle: `Pending → Accepted | Rejected | Expired`.

pub mod aggregator;
pub mod outliers;
pub mod quorum;
pub mod strategy;

pub use aggregator::ByzantineAggregator;
pub use outliers::{iqr_fence, Fence};
pub use quorum::{fault_tolerance, quorum_size};
pub use strategy::{strategy_for, AggregationStrategy, Median, TrimmedMean};
