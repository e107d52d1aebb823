//! Trackable lifecycle manager.
//!
//! Turns the raw per-frame observation list coming from the perception source
//! into per-marker [`LifecycleEvent`]s:
//!
//! | Situation | Event |
//! |---|---|
//! | tracked observation of an unknown identity | `Added` |
//! | tracked observation of a known identity | `Updated` |
//! | identity absent for longer than `lost_timeout_seconds` | `Lost` (entity removed) |
//!
//! Untracked observations count as "not visible": they never create or
//! refresh an entity.  A marker that disappears and comes back within the
//! timeout is treated as continuously tracked; it stays silent while hidden.
//!
//! # Example
//!
//! ```rust
//! use tagsense_perception::lifecycle::{LifecycleConfig, LifecycleManager};
//! use tagsense_types::{LifecycleEvent, Observation, Pose};
//!
//! let mut manager = LifecycleManager::new(LifecycleConfig::default());
//! let seen = vec![Observation::tracked("A", Pose::default(), 0.0)];
//!
//! let events = manager.process_frame(&seen, 0.0);
//! assert!(matches!(events[0], LifecycleEvent::Added(_)));
//!
//! // Hidden for longer than the 1 s default timeout.
//! let events = manager.process_frame(&[], 1.5);
//! assert!(matches!(events[0], LifecycleEvent::Lost(_)));
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tagsense_middleware::{ListenerId, Listeners};
use tagsense_types::{LifecycleEvent, Observation, Pose, TrackedEntity};
use tracing::{debug, info};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds of continuous absence after which a marker is declared lost.
    pub lost_timeout_seconds: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            lost_timeout_seconds: 1.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Read-only view
// ────────────────────────────────────────────────────────────────────────────

/// What downstream components may read from the lifecycle table.
///
/// [`LifecycleManager`] is the only writer; consumers receive `&dyn
/// TrackingView` (or `&LifecycleManager`) and never mutate entities.
pub trait TrackingView {
    /// Identities tracked in the most recent frame.
    fn visible_identities(&self) -> &HashSet<String>;

    /// Latest pose of a known identity.
    fn last_pose(&self, identity: &str) -> Option<Pose>;
}

// ────────────────────────────────────────────────────────────────────────────
// LifecycleManager
// ────────────────────────────────────────────────────────────────────────────

/// Sole owner of the [`TrackedEntity`] table.
///
/// Call [`LifecycleManager::process_frame`] exactly once per cycle.
#[derive(Debug, Default)]
pub struct LifecycleManager {
    config: LifecycleConfig,
    entities: HashMap<String, TrackedEntity>,
    visible: HashSet<String>,
    detection_count: u64,
    listeners: Listeners<LifecycleEvent>,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Ingest one frame of observations at cycle time `now` (seconds).
    ///
    /// Returns the events produced this cycle, in emission order, after
    /// dispatching them to the registered listeners.  Events for one identity
    /// keep their order; no order is promised across identities.
    pub fn process_frame(&mut self, observations: &[Observation], now: f64) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        self.visible.clear();

        for obs in observations {
            if !obs.is_tracked {
                continue;
            }
            if obs.identity.is_empty() {
                debug!("ignoring observation without identity");
                continue;
            }

            self.visible.insert(obs.identity.clone());
            let pose = obs.pose();

            match self.entities.get_mut(&obs.identity) {
                Some(entity) => {
                    entity.update_pose(pose, now);
                    events.push(LifecycleEvent::Updated(entity.clone()));
                }
                None => {
                    self.detection_count += 1;
                    let entity = TrackedEntity::new(obs.identity.clone(), pose, now);
                    info!(
                        identity = %entity.identity,
                        detection = self.detection_count,
                        frame_timestamp = obs.frame_timestamp,
                        "marker added"
                    );
                    self.entities.insert(obs.identity.clone(), entity.clone());
                    events.push(LifecycleEvent::Added(entity));
                }
            }
        }

        let mut expired: Vec<String> = Vec::new();
        for (identity, entity) in self.entities.iter_mut() {
            if self.visible.contains(identity) {
                continue;
            }
            entity.is_tracked = false;
            if now - entity.last_seen_timestamp > self.config.lost_timeout_seconds {
                expired.push(identity.clone());
            }
        }
        expired.sort();

        for identity in expired {
            if let Some(entity) = self.entities.remove(&identity) {
                info!(
                    identity = %entity.identity,
                    absent_for = now - entity.last_seen_timestamp,
                    "marker lost"
                );
                events.push(LifecycleEvent::Lost(entity));
            }
        }

        for event in &events {
            self.listeners.emit(event);
        }
        events
    }

    /// Identities observed as tracked in the most recent frame.  This is not
    /// the same as "not yet timed out": a hidden marker inside its grace
    /// window is known but not visible.
    pub fn current_visible_identities(&self) -> &HashSet<String> {
        &self.visible
    }

    pub fn query(&self, identity: &str) -> Option<&TrackedEntity> {
        self.entities.get(identity)
    }

    /// Every entity that has not timed out, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    /// Total number of `Added` events since construction.
    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    /// Number of entities currently in the table.
    pub fn tracked_count(&self) -> usize {
        self.entities.len()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&LifecycleEvent) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Drop every entity without emitting `Lost`.  The detection counter is
    /// kept.
    pub fn reset(&mut self) {
        debug!(dropped = self.entities.len(), "lifecycle table reset");
        self.entities.clear();
        self.visible.clear();
    }
}

impl TrackingView for LifecycleManager {
    fn visible_identities(&self) -> &HashSet<String> {
        &self.visible
    }

    fn last_pose(&self, identity: &str) -> Option<Pose> {
        self.entities.get(identity).map(|e| e.last_pose)
    }
}
