//! One-shot calibration locker.
//!
//! During setup the [`CalibrationLocker`] collects raw poses for every marker
//! for a fixed window, then freezes one robust [`LockedPose`] per marker.
//!
//! ```text
//!            begin_collect            window elapsed
//!   Idle ─────────────────► Collecting ─────────────► Locked  (≥ 1 marker locked)
//!    ▲                          │     └─────────────► Failed  (nothing locked)
//!    └──────── abort ───────────┘
//!                 Locked / Failed ── retry ──► Collecting
//! ```
//!
//! A marker with fewer than `minimum_samples` samples is silently left out;
//! only a window that locks nothing at all is reported, via
//! [`CalibrationEvent::LockFailed`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tagsense_middleware::{ListenerId, Listeners};
use tagsense_types::{CalibrationEvent, LifecycleEvent, LockedPose, TrackedEntity};
use tracing::{debug, info, warn};

use crate::robust::{self, DEFAULT_IQR_K};
use crate::smoother::PoseSample;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Length of the collection window.  Deployments use 10–30 s.
    pub collection_duration_seconds: f64,
    /// Samples a marker needs before it can be locked.
    pub minimum_samples: usize,
    /// IQR fence multiplier for the locked position.
    pub iqr_k: f32,
    /// Slerp factor from the median-index sample toward the most recent one.
    pub rotation_blend: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            collection_duration_seconds: 10.0,
            minimum_samples: 5,
            iqr_k: DEFAULT_IQR_K,
            rotation_blend: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationState {
    Idle,
    Collecting,
    Locked,
    Failed,
}

// ────────────────────────────────────────────────────────────────────────────
// CalibrationLocker
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CalibrationLocker {
    config: CalibrationConfig,
    state: CalibrationState,
    started_at: f64,
    histories: HashMap<String, Vec<PoseSample>>,
    locked: HashMap<String, LockedPose>,
    listeners: Listeners<CalibrationEvent>,
}

impl CalibrationLocker {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: CalibrationState::Idle,
            started_at: 0.0,
            histories: HashMap::new(),
            locked: HashMap::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn collection_duration(&self) -> f64 {
        self.config.collection_duration_seconds
    }

    /// Start (or restart) a collection window at `now`, discarding every
    /// sample and locked pose from earlier windows.
    pub fn begin_collect(&mut self, now: f64) -> Vec<CalibrationEvent> {
        self.state = CalibrationState::Collecting;
        self.started_at = now;
        self.histories.clear();
        self.locked.clear();
        info!(
            duration = self.config.collection_duration_seconds,
            "calibration collecting started"
        );
        self.publish(vec![CalibrationEvent::CollectingStarted])
    }

    /// Re-enter collection after a lock or a failure.
    pub fn retry(&mut self, now: f64) -> Vec<CalibrationEvent> {
        debug!(previous = ?self.state, "calibration retry");
        self.begin_collect(now)
    }

    /// Abandon an in-flight window.  No-op unless collecting.
    pub fn abort(&mut self) -> Vec<CalibrationEvent> {
        if self.state != CalibrationState::Collecting {
            return Vec::new();
        }
        self.state = CalibrationState::Idle;
        self.histories.clear();
        info!("calibration collection aborted");
        self.publish(vec![CalibrationEvent::CollectionAborted])
    }

    /// Record the pose carried by an `Updated` event.  Ignored unless
    /// collecting, and ignored for entities that are not currently tracked.
    pub fn handle_updated(&mut self, entity: &TrackedEntity) {
        if self.state != CalibrationState::Collecting || !entity.is_tracked {
            return;
        }
        self.histories
            .entry(entity.identity.clone())
            .or_default()
            .push(PoseSample {
                timestamp: entity.last_seen_timestamp,
                position: entity.last_pose.position,
                rotation: entity.last_pose.rotation,
            });
    }

    /// Convenience for wiring straight to a lifecycle event stream.
    pub fn on_lifecycle_event(&mut self, event: &LifecycleEvent) {
        if let LifecycleEvent::Updated(entity) = event {
            self.handle_updated(entity);
        }
    }

    /// Per-cycle check; finalizes the window once it has elapsed.
    pub fn tick(&mut self, now: f64) -> Vec<CalibrationEvent> {
        if self.state != CalibrationState::Collecting {
            return Vec::new();
        }
        if now - self.started_at < self.config.collection_duration_seconds {
            return Vec::new();
        }
        self.finalize()
    }

    fn finalize(&mut self) -> Vec<CalibrationEvent> {
        let mut events = Vec::new();

        let mut identities: Vec<&String> = self.histories.keys().collect();
        identities.sort();

        for identity in identities {
            let samples = &self.histories[identity];
            if samples.len() < self.config.minimum_samples {
                debug!(
                    identity = %identity,
                    samples = samples.len(),
                    minimum = self.config.minimum_samples,
                    "too few samples to lock"
                );
                continue;
            }
            let Some(pose) = locked_pose_from(identity, samples, &self.config) else {
                continue;
            };
            info!(
                identity = %identity,
                x = pose.position.x,
                y = pose.position.y,
                z = pose.position.z,
                "pose locked"
            );
            self.locked.insert(identity.clone(), pose.clone());
            events.push(CalibrationEvent::PoseLocked(pose));
        }

        if self.locked.is_empty() {
            self.state = CalibrationState::Failed;
            warn!(markers = self.histories.len(), "calibration failed: no pose locked");
            events.push(CalibrationEvent::LockFailed);
        } else {
            self.state = CalibrationState::Locked;
            info!(locked = self.locked.len(), "calibration locked");
        }

        self.publish(events)
    }

    /// Seconds since the window opened; `0` unless collecting.
    pub fn elapsed_seconds(&self, now: f64) -> f64 {
        if self.state == CalibrationState::Collecting {
            now - self.started_at
        } else {
            0.0
        }
    }

    /// Frozen pose for `identity`, if one was locked.
    pub fn locked_pose(&self, identity: &str) -> Option<&LockedPose> {
        self.locked.get(identity)
    }

    pub fn locked_poses(&self) -> impl Iterator<Item = &LockedPose> {
        self.locked.values()
    }

    pub fn locked_pose_count(&self) -> usize {
        self.locked.len()
    }

    /// Samples collected so far in the current window.
    pub fn sample_count(&self, identity: &str) -> usize {
        self.histories.get(identity).map_or(0, Vec::len)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&CalibrationEvent) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn publish(&mut self, events: Vec<CalibrationEvent>) -> Vec<CalibrationEvent> {
        for event in &events {
            self.listeners.emit(event);
        }
        events
    }
}

/// Position: per-axis IQR-trimmed mean, empty axes falling back to the most
/// recent sample.  Rotation: the median-index sample blended toward the most
/// recent one.
fn locked_pose_from(identity: &str, samples: &[PoseSample], config: &CalibrationConfig) -> Option<LockedPose> {
    let latest = samples.last()?;
    let mid = &samples[samples.len() / 2];

    let positions: Vec<_> = samples.iter().map(|s| s.position).collect();
    let position = robust::trimmed_mean_position(&positions, config.iqr_k, latest.position);
    let rotation = mid.rotation.slerp(latest.rotation, config.rotation_blend);

    Some(LockedPose {
        identity: identity.to_string(),
        position,
        rotation,
    })
}
