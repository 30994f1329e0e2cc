//! # chorus-observability
//!
//! Tracing subscriber setup with named spans, the event-sink implementations
//! injected into the engine, sync counters, and degradation tracking.

pub mod degradation;
pub mod metrics;
pub mod sinks;
pub mod tracing_setup;

pub use degradation::{ComponentHealth, DegradationTracker, RecoveryStatus};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use sinks::{FanoutSink, MemorySink, MetricsSink, TracingSink};
