//! Quorum arithmetic for `N ≥ 3f + 1`.

use chorus_core::constants::FLOAT_TOLERANCE;

/// Reports needed out of `active` replicas: `ceil(fraction · active)`, at
/// least one.
pub fn quorum_size(active: usize, fraction: f64) -> usize {
    let raw = (fraction * active as f64 - FLOAT_TOLERANCE).ceil();
    (raw.max(1.0) as usize).min(active.max(1))
}

/// Faulty replicas tolerated among `active`: `floor((active − 1) / 3)`.
pub fn fault_tolerance(active: usize) -> usize {
    active.saturating_sub(1) / 3
}
