//! Outlier-robust averaging shared by the smoother and the calibration locker.
//!
//! Each axis is filtered independently with an interquartile-range fence:
//!
//! ```text
//! Q1  = v[floor(0.25 * (n - 1))]      (v sorted ascending)
//! Q3  = v[floor(0.75 * (n - 1))]
//! keep  Q1 - k·IQR <= v <= Q3 + k·IQR
//! ```
//!
//! Percentiles are nearest-rank without interpolation.  Treating axes
//! independently is an approximation: a sample that is an outlier only in the
//! joint 3-D sense survives.

use tagsense_types::{Axis, Vec3};

/// Lower quartile used for the IQR fence.
pub const Q1_PERCENTILE: f32 = 0.25;
/// Upper quartile used for the IQR fence.
pub const Q3_PERCENTILE: f32 = 0.75;
/// Default fence multiplier (Tukey's 1.5).
pub const DEFAULT_IQR_K: f32 = 1.5;

/// Nearest-rank index `floor(p * (n - 1))`.  `n` must be non-zero.
pub fn percentile_index(p: f32, n: usize) -> usize {
    debug_assert!(n > 0);
    let idx = (p * (n - 1) as f32).floor() as usize;
    idx.min(n - 1)
}

/// Mean of the values inside the IQR fence, or `None` when `values` is empty
/// or every value was rejected.
pub fn iqr_trimmed_mean(values: &[f32], k: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    let n = sorted.len();
    let q1 = sorted[percentile_index(Q1_PERCENTILE, n)];
    let q3 = sorted[percentile_index(Q3_PERCENTILE, n)];
    let iqr = q3 - q1;
    let min = q1 - k * iqr;
    let max = q3 + k * iqr;

    // Accumulate in f64 so long windows do not drift.
    let (sum, count) = sorted
        .iter()
        .filter(|v| **v >= min && **v <= max)
        .fold((0.0f64, 0usize), |(s, c), v| (s + f64::from(*v), c + 1));

    if count == 0 {
        None
    } else {
        Some((sum / count as f64) as f32)
    }
}

/// Per-axis IQR-trimmed mean of `positions`.  Axes where nothing survives
/// take the matching component of `fallback`.
pub fn trimmed_mean_position(positions: &[Vec3], k: f32, fallback: Vec3) -> Vec3 {
    let mut out = [0.0f32; 3];
    for (slot, axis) in out.iter_mut().zip(Axis::ALL) {
        let values: Vec<f32> = positions.iter().map(|p| p.axis(axis)).collect();
        *slot = iqr_trimmed_mean(&values, k).unwrap_or_else(|| fallback.axis(axis));
    }
    Vec3::new(out[0], out[1], out[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_index_is_floor_nearest_rank() {
        // n = 11 → (n-1) = 10 → Q1 at 2, Q3 at 7.
        assert_eq!(percentile_index(Q1_PERCENTILE, 11), 2);
        assert_eq!(percentile_index(Q3_PERCENTILE, 11), 7);
        // n = 4 → 0.75 * 3 = 2.25 → 2 (not interpolated).
        assert_eq!(percentile_index(Q3_PERCENTILE, 4), 2);
        assert_eq!(percentile_index(Q1_PERCENTILE, 1), 0);
    }

    #[test]
    fn single_outlier_is_rejected() {
        let mut values = vec![0.0f32; 10];
        values.push(100.0);
        let mean = iqr_trimmed_mean(&values, DEFAULT_IQR_K).unwrap();
        assert!(mean.abs() < 1e-5, "mean = {mean}");
    }

    #[test]
    fn spread_values_are_all_kept() {
        let values = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let mean = iqr_trimmed_mean(&values, DEFAULT_IQR_K).unwrap();
        assert!((mean - 3.0).abs() < 1e-5);
    }

    #[test]
    fn empty_input_has_no_mean() {
        assert!(iqr_trimmed_mean(&[], DEFAULT_IQR_K).is_none());
    }

    #[test]
    fn negative_k_can_reject_everything() {
        // With k < 0 and a non-zero IQR the fence collapses past the
        // quartiles and nothing survives.
        let values = [0.0f32, 1.0, 2.0, 3.0];
        assert!(iqr_trimmed_mean(&values, -10.0).is_none());
    }

    #[test]
    fn empty_axis_uses_fallback_component() {
        let positions = [
            Vec3::new(0.0, 5.0, 1.0),
            Vec3::new(1.0, 5.0, 2.0),
            Vec3::new(2.0, 5.0, 3.0),
            Vec3::new(3.0, 5.0, 4.0),
        ];
        // y has zero IQR so k is irrelevant there; x and z are rejected.
        let p = trimmed_mean_position(&positions, -10.0, Vec3::new(9.0, 9.0, 9.0));
        assert!((p.x - 9.0).abs() < 1e-5);
        assert!((p.y - 5.0).abs() < 1e-5);
        assert!((p.z - 9.0).abs() < 1e-5);
    }
}
