//! Engine-wide constants that are not tunable through config.

/// Wire protocol version carried in every gossip frame.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Tolerance used when comparing floating-point fields across replicas.
pub const FLOAT_TOLERANCE: f64 = 1e-9;

/// Tolerance for the composite weight sum check in config validation.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Minimum number of numeric votes before the IQR outlier fence applies.
pub const MIN_VALUES_FOR_IQR: usize = 4;

/// Component name used in degradation events for the similarity provider.
pub const SIMILARITY_COMPONENT: &str = "similarity";

/// Fallback name reported when lexical similarity replaces the provider.
pub const LEXICAL_FALLBACK: &str = "lexical-token-overlap";
