//! IQR outlier fence (Tukey fences).
//!
//! Values outside `[Q1 − w, Q3 + w]` are outliers, where `w` is `k·IQR` but
//! never less than an absolute floor. When most values are identical the
//! IQR collapses to zero and the floor alone sets the fence. Quartiles use
//! linear interpolation. Fewer than [`MIN_VALUES_FOR_IQR`] values are never
//! fenced.

use std::cmp::Ordering;

use chorus_core::constants::MIN_VALUES_FOR_IQR;

/// Split of a value list into kept and fenced-out indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fence {
    pub lower: f64,
    pub upper: f64,
    pub inliers: Vec<usize>,
    pub outliers: Vec<usize>,
}

pub fn iqr_fence(values: &[f64], multiplier: f64, floor: f64) -> Fence {
    if values.len() < MIN_VALUES_FOR_IQR {
        return Fence {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            inliers: (0..values.len()).collect(),
            outliers: Vec::new(),
        };
    }

    let sorted = sorted(values);
    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let width = if iqr.is_finite() {
        (multiplier * iqr).max(floor)
    } else {
        floor
    };
    let lower = q1 - width;
    let upper = q3 + width;

    let (inliers, outliers) = (0..values.len()).partition(|&i| {
        let v = values[i];
        v >= lower && v <= upper
    });
    Fence {
        lower,
        upper,
        inliers,
        outliers,
    }
}

pub(crate) fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Percentile of an ascending slice using linear interpolation.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (rank.ceil() as usize).min(n - 1);
            let frac = rank - lower as f64;
            sorted[lower] * (1.0 - frac) + sorted[upper] * frac
        }
    }
}
