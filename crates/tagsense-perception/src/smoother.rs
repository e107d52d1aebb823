//! Rolling-window pose smoother.
//!
//! [`PoseSmoother`] keeps a time-bounded history of raw poses per marker and
//! returns an outlier-robust average on demand.  Position is filtered with a
//! per-axis IQR fence (see [`crate::robust`]); rotation is not filtered, it is
//! blended from a caller-supplied fallback toward the latest sample, favouring
//! stability over responsiveness.
//!
//! # Example
//!
//! ```rust
//! use tagsense_perception::smoother::{PoseSmoother, SmootherConfig};
//! use tagsense_types::{Quaternion, Vec3};
//!
//! let mut smoother = PoseSmoother::new(SmootherConfig::default());
//! for i in 0..5 {
//!     smoother.add_sample("A", Vec3::new(1.0, 0.0, 0.0), Quaternion::identity(), i as f64 * 0.1);
//! }
//!
//! let pose = smoother.smoothed_pose("A", Vec3::zero(), Quaternion::identity());
//! assert!((pose.position.x - 1.0).abs() < 1e-5);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tagsense_types::{Pose, Quaternion, Vec3};
use tracing::trace;

use crate::robust::{self, DEFAULT_IQR_K};

/// Below this many samples the smoother returns the fallback untouched.
pub const MIN_SMOOTHING_SAMPLES: usize = 3;

/// Tunables for [`PoseSmoother`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Samples older than this (relative to the newest insert) are dropped.
    pub history_seconds: f64,
    /// IQR fence multiplier.
    pub iqr_k: f32,
    /// Slerp factor from the fallback rotation toward the latest sample.
    pub rotation_blend: f32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            history_seconds: 5.0,
            iqr_k: DEFAULT_IQR_K,
            rotation_blend: 0.2,
        }
    }
}

/// One timestamped raw pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub timestamp: f64,
    pub position: Vec3,
    pub rotation: Quaternion,
}

/// Per-identity rolling-window outlier-robust averager.
#[derive(Debug, Default)]
pub struct PoseSmoother {
    config: SmootherConfig,
    histories: HashMap<String, Vec<PoseSample>>,
}

impl PoseSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            histories: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Append a sample for `identity` and prune everything older than
    /// `now - history_seconds`.  Empty identities are ignored.
    pub fn add_sample(&mut self, identity: &str, position: Vec3, rotation: Quaternion, now: f64) {
        if identity.is_empty() {
            return;
        }
        let history = self.histories.entry(identity.to_string()).or_default();
        history.push(PoseSample {
            timestamp: now,
            position,
            rotation,
        });

        let cutoff = now - self.config.history_seconds;
        history.retain(|s| s.timestamp >= cutoff);
        trace!(identity, window = history.len(), "pose sample added");
    }

    /// Smoothed pose for `identity`.
    ///
    /// Returns the fallback unchanged when fewer than
    /// [`MIN_SMOOTHING_SAMPLES`] are in the window.
    pub fn smoothed_pose(
        &self,
        identity: &str,
        fallback_position: Vec3,
        fallback_rotation: Quaternion,
    ) -> Pose {
        let history = match self.histories.get(identity) {
            Some(h) if h.len() >= MIN_SMOOTHING_SAMPLES => h,
            _ => return Pose::new(fallback_position, fallback_rotation),
        };

        let positions: Vec<Vec3> = history.iter().map(|s| s.position).collect();
        let position = robust::trimmed_mean_position(&positions, self.config.iqr_k, fallback_position);

        let rotation = match history.last() {
            Some(latest) => fallback_rotation.slerp(latest.rotation, self.config.rotation_blend),
            None => fallback_rotation,
        };

        Pose::new(position, rotation)
    }

    /// Number of samples currently in the window for `identity`.
    pub fn sample_count(&self, identity: &str) -> usize {
        self.histories.get(identity).map_or(0, Vec::len)
    }

    /// The raw window for `identity`, oldest first.
    pub fn samples(&self, identity: &str) -> &[PoseSample] {
        self.histories.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Forget the history of one identity.
    pub fn clear(&mut self, identity: &str) {
        self.histories.remove(identity);
    }

    pub fn clear_all(&mut self) {
        self.histories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn smoother() -> PoseSmoother {
        PoseSmoother::new(SmootherConfig::default())
    }

    #[test]
    fn outlier_fully_rejected() {
        let mut s = smoother();
        for i in 0..10 {
            s.add_sample("A", Vec3::zero(), Quaternion::identity(), i as f64 * 0.1);
        }
        s.add_sample("A", Vec3::new(100.0, 100.0, 100.0), Quaternion::identity(), 1.0);

        let pose = s.smoothed_pose("A", Vec3::new(5.0, 5.0, 5.0), Quaternion::identity());
        assert!(pose.position.length() < 1e-5, "got {:?}", pose.position);
    }

    #[test]
    fn fewer_than_three_samples_returns_fallback() {
        let mut s = smoother();
        let fallback_pos = Vec3::new(1.0, 2.0, 3.0);
        let fallback_rot = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.3);

        assert_eq!(s.smoothed_pose("A", fallback_pos, fallback_rot), Pose::new(fallback_pos, fallback_rot));

        s.add_sample("A", Vec3::new(9.0, 9.0, 9.0), Quaternion::identity(), 0.0);
        s.add_sample("A", Vec3::new(9.0, 9.0, 9.0), Quaternion::identity(), 0.1);
        assert_eq!(s.smoothed_pose("A", fallback_pos, fallback_rot), Pose::new(fallback_pos, fallback_rot));
    }

    #[test]
    fn window_prunes_old_samples_on_insert() {
        let mut s = PoseSmoother::new(SmootherConfig {
            history_seconds: 1.0,
            ..SmootherConfig::default()
        });
        s.add_sample("A", Vec3::zero(), Quaternion::identity(), 0.0);
        s.add_sample("A", Vec3::zero(), Quaternion::identity(), 0.5);
        s.add_sample("A", Vec3::zero(), Quaternion::identity(), 1.0);
        assert_eq!(s.sample_count("A"), 3);

        s.add_sample("A", Vec3::zero(), Quaternion::identity(), 1.6);
        // cutoff = 0.6 → samples at 0.0 and 0.5 are gone.
        assert_eq!(s.sample_count("A"), 2);
        assert!(s.samples("A").iter().all(|p| p.timestamp >= 0.6));
    }

    #[test]
    fn rotation_blends_toward_latest_sample() {
        let mut s = smoother();
        let target = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        for i in 0..3 {
            s.add_sample("A", Vec3::zero(), target, i as f64);
        }
        let pose = s.smoothed_pose("A", Vec3::zero(), Quaternion::identity());
        // 20 % of the way from identity to 90°.
        assert!((pose.rotation.angle_to(Quaternion::identity()) - 0.2 * FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn identities_are_independent() {
        let mut s = smoother();
        for i in 0..3 {
            s.add_sample("A", Vec3::new(1.0, 0.0, 0.0), Quaternion::identity(), i as f64);
            s.add_sample("B", Vec3::new(-1.0, 0.0, 0.0), Quaternion::identity(), i as f64);
        }
        let a = s.smoothed_pose("A", Vec3::zero(), Quaternion::identity());
        let b = s.smoothed_pose("B", Vec3::zero(), Quaternion::identity());
        assert!((a.position.x - 1.0).abs() < 1e-5);
        assert!((b.position.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_identity_is_ignored() {
        let mut s = smoother();
        s.add_sample("", Vec3::zero(), Quaternion::identity(), 0.0);
        assert_eq!(s.sample_count(""), 0);
    }

    #[test]
    fn clear_forgets_history() {
        let mut s = smoother();
        s.add_sample("A", Vec3::zero(), Quaternion::identity(), 0.0);
        s.add_sample("B", Vec3::zero(), Quaternion::identity(), 0.0);
        s.clear("A");
        assert_eq!(s.sample_count("A"), 0);
        assert_eq!(s.sample_count("B"), 1);
        s.clear_all();
        assert_eq!(s.sample_count("B"), 0);
    }
}
