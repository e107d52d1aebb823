//! Co-visibility trust monitor.
//!
//! During **Setup** the monitor learns, for every marker X, which other
//! markers are seen together with X within `distance_threshold_meters`
//! (X's *known set*, which always includes X).  During **Gameplay** the
//! currently visible set is compared against those known sets every cycle:
//!
//! ```text
//! min_ratio        = min over non-empty sets S of |visible ∩ S| / |S|   (starts at 1)
//! unknown_fraction = |visible \ ∪S| / |visible|                        (0 if nothing visible)
//! trust            = clamp01(min(min_ratio, 1 - unknown_fraction))
//! ```
//!
//! A trust drop means either a calibrated marker went missing or an
//! uncalibrated one appeared.  `TrustChanged` is published only when the new
//! score moves by more than the hysteresis; `TrustLow` is published on every
//! evaluation whose stored score sits below `trust_low_threshold`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tagsense_middleware::{ListenerId, Listeners};
use tagsense_types::{TrackedEntity, TrustEvent};
use tracing::{debug, info, warn};

use crate::lifecycle::TrackingView;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Two markers closer than this are recorded as co-visible neighbours.
    pub distance_threshold_meters: f32,
    /// Scores strictly below this raise `TrustLow`.
    pub trust_low_threshold: f32,
    /// Minimum change before a new score is stored and published.
    pub hysteresis: f32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            distance_threshold_meters: 1.0,
            trust_low_threshold: 0.5,
            hysteresis: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustMode {
    Idle,
    Setup,
    Gameplay,
}

/// Known set per marker identity.
pub type KnownSets = HashMap<String, HashSet<String>>;

#[derive(Debug)]
pub struct TrustMonitor {
    config: TrustConfig,
    mode: TrustMode,
    current_trust: f32,
    known_sets: KnownSets,
    listeners: Listeners<TrustEvent>,
}

impl TrustMonitor {
    pub fn new(config: TrustConfig) -> Self {
        Self {
            config,
            mode: TrustMode::Idle,
            current_trust: 1.0,
            known_sets: HashMap::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    pub fn mode(&self) -> TrustMode {
        self.mode
    }

    pub fn current_trust(&self) -> f32 {
        self.current_trust
    }

    pub fn known_sets(&self) -> &KnownSets {
        &self.known_sets
    }

    /// Clear all known sets and start learning.
    pub fn begin_setup(&mut self) {
        self.mode = TrustMode::Setup;
        self.known_sets.clear();
        self.current_trust = 1.0;
        info!("trust setup started");
    }

    /// Freeze the known sets and score `visible` right away.
    pub fn begin_gameplay(&mut self, visible: &HashSet<String>) -> Vec<TrustEvent> {
        self.mode = TrustMode::Gameplay;
        info!(known = self.known_sets.len(), "trust monitoring started");
        self.evaluate(visible)
    }

    /// Back to Idle with empty known sets.  Publishes nothing.
    pub fn reset(&mut self) {
        self.mode = TrustMode::Idle;
        self.known_sets.clear();
        self.current_trust = 1.0;
        debug!("trust monitor reset");
    }

    /// Learn co-visibility from one `Updated` entity.  Only active in Setup.
    pub fn handle_updated(&mut self, entity: &TrackedEntity, view: &dyn TrackingView) {
        if self.mode != TrustMode::Setup {
            return;
        }
        let visible = view.visible_identities();
        if visible.is_empty() {
            return;
        }

        let key = entity.identity.as_str();
        let origin = entity.last_pose.position;
        self.add_known(key, key);

        for other in visible {
            if other == key {
                continue;
            }
            let Some(pose) = view.last_pose(other) else {
                continue;
            };
            if origin.distance(pose.position) <= self.config.distance_threshold_meters {
                self.add_known(key, other);
            }
        }
    }

    /// Score `visible` against the known sets.  No-op outside Gameplay.
    pub fn evaluate(&mut self, visible: &HashSet<String>) -> Vec<TrustEvent> {
        if self.mode != TrustMode::Gameplay {
            return Vec::new();
        }
        let trust = score(&self.known_sets, visible);
        self.set_trust(trust)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&TrustEvent) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn add_known(&mut self, key: &str, neighbour: &str) {
        let set = self.known_sets.entry(key.to_string()).or_default();
        if set.insert(neighbour.to_string()) {
            debug!(key, neighbour, "known neighbour recorded");
        }
    }

    fn set_trust(&mut self, value: f32) -> Vec<TrustEvent> {
        let mut events = Vec::new();
        let clamped = value.clamp(0.0, 1.0);

        if (clamped - self.current_trust).abs() > self.config.hysteresis {
            self.current_trust = clamped;
            info!(trust = clamped, "trust changed");
            events.push(TrustEvent::TrustChanged(clamped));
        }

        if self.current_trust < self.config.trust_low_threshold {
            warn!(
                trust = self.current_trust,
                threshold = self.config.trust_low_threshold,
                "trust low"
            );
            events.push(TrustEvent::TrustLow);
        }

        for event in &events {
            self.listeners.emit(event);
        }
        events
    }
}

/// Pure trust score of `visible` against `known_sets`.  No known sets at all
/// scores `0`.
pub fn score(known_sets: &KnownSets, visible: &HashSet<String>) -> f32 {
    if known_sets.is_empty() {
        return 0.0;
    }

    let mut min_ratio = 1.0f32;
    let mut union: HashSet<&str> = HashSet::new();
    for set in known_sets.values() {
        union.extend(set.iter().map(String::as_str));
        if set.is_empty() {
            continue;
        }
        let hit = set.iter().filter(|id| visible.contains(*id)).count();
        min_ratio = min_ratio.min(hit as f32 / set.len() as f32);
    }

    let unknown_fraction = if visible.is_empty() {
        0.0
    } else {
        let unknown = visible.iter().filter(|id| !union.contains(id.as_str())).count();
        unknown as f32 / visible.len() as f32
    };

    min_ratio.min(1.0 - unknown_fraction).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsense_types::{Pose, Quaternion, Vec3};

    /// Minimal stand-in for the lifecycle table.
    struct FakeView {
        visible: HashSet<String>,
        poses: HashMap<String, Pose>,
    }

    impl FakeView {
        fn new(markers: &[(&str, Vec3)]) -> Self {
            Self {
                visible: markers.iter().map(|(id, _)| id.to_string()).collect(),
                poses: markers
                    .iter()
                    .map(|(id, p)| (id.to_string(), Pose::new(*p, Quaternion::identity())))
                    .collect(),
            }
        }

        fn entity(&self, id: &str) -> TrackedEntity {
            TrackedEntity::new(id, self.poses[id], 0.0)
        }
    }

    impl TrackingView for FakeView {
        fn visible_identities(&self) -> &HashSet<String> {
            &self.visible
        }

        fn last_pose(&self, identity: &str) -> Option<Pose> {
            self.poses.get(identity).copied()
        }
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// Monitor that learned {A, B} together and C on its own.
    fn calibrated() -> TrustMonitor {
        let mut m = TrustMonitor::new(TrustConfig::default());
        m.begin_setup();
        let view = FakeView::new(&[
            ("A", Vec3::new(0.0, 0.0, 0.0)),
            ("B", Vec3::new(0.5, 0.0, 0.0)),
            ("C", Vec3::new(5.0, 0.0, 0.0)),
        ]);
        for id in ["A", "B", "C"] {
            m.handle_updated(&view.entity(id), &view);
        }
        m
    }

    #[test]
    fn setup_records_neighbours_within_threshold() {
        let m = calibrated();
        assert_eq!(m.known_sets()["A"], set(&["A", "B"]));
        assert_eq!(m.known_sets()["B"], set(&["A", "B"]));
        assert_eq!(m.known_sets()["C"], set(&["C"]));
    }

    #[test]
    fn empty_visible_set_learns_nothing() {
        let mut m = TrustMonitor::new(TrustConfig::default());
        m.begin_setup();
        let mut view = FakeView::new(&[("A", Vec3::zero())]);
        view.visible.clear();
        m.handle_updated(&view.entity("A"), &view);
        assert!(m.known_sets().is_empty());
    }

    #[test]
    fn updates_outside_setup_are_ignored() {
        let mut m = TrustMonitor::new(TrustConfig::default());
        let view = FakeView::new(&[("A", Vec3::zero())]);
        m.handle_updated(&view.entity("A"), &view);
        assert!(m.known_sets().is_empty());
    }

    #[test]
    fn full_union_visible_scores_one() {
        let m = calibrated();
        assert!((score(m.known_sets(), &set(&["A", "B", "C"])) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn disjoint_visible_scores_zero() {
        let m = calibrated();
        assert!(score(m.known_sets(), &set(&["X", "Y"])).abs() < 1e-5);
    }

    #[test]
    fn missing_neighbour_halves_trust() {
        let m = calibrated();
        // A's set {A,B} only half visible.
        assert!((score(m.known_sets(), &set(&["A", "C"])) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn unknown_marker_lowers_trust() {
        let m = calibrated();
        // 1 of 4 visible is unknown → 0.75.
        assert!((score(m.known_sets(), &set(&["A", "B", "C", "X"])) - 0.75).abs() < 1e-5);
    }

    #[test]
    fn no_known_sets_scores_zero() {
        assert_eq!(score(&KnownSets::new(), &set(&["A"])), 0.0);
    }

    #[test]
    fn gameplay_publishes_change_and_low() {
        let mut m = calibrated();
        let events = m.begin_gameplay(&set(&["X"]));
        assert_eq!(events, vec![TrustEvent::TrustChanged(0.0), TrustEvent::TrustLow]);
        assert_eq!(m.mode(), TrustMode::Gameplay);

        // Still low on the next cycle: no change, but low again.
        assert_eq!(m.evaluate(&set(&["X"])), vec![TrustEvent::TrustLow]);
    }

    #[test]
    fn change_within_hysteresis_is_not_stored() {
        let mut m = TrustMonitor::new(TrustConfig {
            hysteresis: 0.3,
            ..TrustConfig::default()
        });
        m.begin_setup();
        let view = FakeView::new(&[
            ("A", Vec3::zero()),
            ("B", Vec3::new(0.1, 0.0, 0.0)),
            ("C", Vec3::new(0.2, 0.0, 0.0)),
            ("D", Vec3::new(0.3, 0.0, 0.0)),
        ]);
        for id in ["A", "B", "C", "D"] {
            m.handle_updated(&view.entity(id), &view);
        }
        // Every set is {A,B,C,D}; three visible → 0.75, inside the 0.3 band.
        let events = m.begin_gameplay(&set(&["A", "B", "C"]));
        assert!(events.is_empty());
        assert!((m.current_trust() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn full_visibility_in_gameplay_is_silent() {
        let mut m = calibrated();
        assert!(m.begin_gameplay(&set(&["A", "B", "C"])).is_empty());
        assert!((m.current_trust() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn evaluate_outside_gameplay_is_noop() {
        let mut m = calibrated();
        assert!(m.evaluate(&set(&["X"])).is_empty());
        assert!((m.current_trust() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut m = calibrated();
        m.begin_gameplay(&set(&["X"]));
        m.reset();
        assert_eq!(m.mode(), TrustMode::Idle);
        assert!(m.known_sets().is_empty());
        assert!((m.current_trust() - 1.0).abs() < 1e-5);
    }
}
