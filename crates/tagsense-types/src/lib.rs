//! `tagsense-types` – shared vocabulary of the marker tracking stack.
//!
//! Geometry primitives live in [`geometry`]; this module holds the records
//! that flow between layers (observations, tracked entities, locked poses),
//! every event the pipeline can emit, and the edge-level error type.

pub mod geometry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use geometry::{Axis, Pose, Quaternion, Vec3};

/// One frame's report for one marker, as produced by the perception source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Stable marker key (e.g. the payload or anchor UUID of a QR code).
    pub identity: String,
    pub position: Vec3,
    #[serde(default)]
    pub orientation: Quaternion,
    /// `false` when the source still reports the marker but has lost tracking.
    #[serde(default = "default_is_tracked")]
    pub is_tracked: bool,
    #[serde(default)]
    pub frame_timestamp: f64,
}

fn default_is_tracked() -> bool {
    true
}

impl Observation {
    /// A tracked observation.
    pub fn tracked(identity: impl Into<String>, pose: Pose, frame_timestamp: f64) -> Self {
        Self {
            identity: identity.into(),
            position: pose.position,
            orientation: pose.rotation,
            is_tracked: true,
            frame_timestamp,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }
}

/// Authoritative record for one marker while it is known to the lifecycle
/// manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub identity: String,
    /// Pose at first detection.
    pub first_pose: Pose,
    /// Most recent tracked pose.
    pub last_pose: Pose,
    pub first_seen_wall_clock: DateTime<Utc>,
    /// Monotonic seconds of the last tracked observation.
    pub last_seen_timestamp: f64,
    /// Whether the marker was tracked in the most recent frame.
    pub is_tracked: bool,
}

impl TrackedEntity {
    pub fn new(identity: impl Into<String>, pose: Pose, now: f64) -> Self {
        Self {
            identity: identity.into(),
            first_pose: pose,
            last_pose: pose,
            first_seen_wall_clock: Utc::now(),
            last_seen_timestamp: now,
            is_tracked: true,
        }
    }

    pub fn update_pose(&mut self, pose: Pose, now: f64) {
        self.last_pose = pose;
        self.last_seen_timestamp = now;
        self.is_tracked = true;
    }
}

/// A calibration-time pose, frozen once per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedPose {
    pub identity: String,
    pub position: Vec3,
    pub rotation: Quaternion,
}

impl LockedPose {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Events
// ────────────────────────────────────────────────────────────────────────────

/// Per-marker lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entity")]
pub enum LifecycleEvent {
    Added(TrackedEntity),
    Updated(TrackedEntity),
    /// Carries the entity as it was at removal: identity, last pose and
    /// last-seen timestamp.
    Lost(TrackedEntity),
}

impl LifecycleEvent {
    pub fn entity(&self) -> &TrackedEntity {
        match self {
            LifecycleEvent::Added(e) | LifecycleEvent::Updated(e) | LifecycleEvent::Lost(e) => e,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum CalibrationEvent {
    CollectingStarted,
    CollectionAborted,
    PoseLocked(LockedPose),
    LockFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum TrustEvent {
    TrustChanged(f32),
    TrustLow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identity")]
pub enum HitEvent {
    HitSuccess(String),
}

/// Union of every event the pipeline emits, in the order a session observed
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "event")]
pub enum TrackingEvent {
    Lifecycle(LifecycleEvent),
    Calibration(CalibrationEvent),
    Trust(TrustEvent),
    Hit(HitEvent),
}

impl TrackingEvent {
    /// Name of the component that produced the event, used as
    /// [`EventEnvelope::source`].
    pub fn source(&self) -> &'static str {
        match self {
            TrackingEvent::Lifecycle(_) => "tagsense-perception::lifecycle",
            TrackingEvent::Calibration(_) => "tagsense-perception::calibration",
            TrackingEvent::Trust(_) => "tagsense-perception::trust",
            TrackingEvent::Hit(_) => "tagsense-kernel::pipeline",
        }
    }
}

impl From<LifecycleEvent> for TrackingEvent {
    fn from(e: LifecycleEvent) -> Self {
        TrackingEvent::Lifecycle(e)
    }
}

impl From<CalibrationEvent> for TrackingEvent {
    fn from(e: CalibrationEvent) -> Self {
        TrackingEvent::Calibration(e)
    }
}

impl From<TrustEvent> for TrackingEvent {
    fn from(e: TrustEvent) -> Self {
        TrackingEvent::Trust(e)
    }
}

impl From<HitEvent> for TrackingEvent {
    fn from(e: HitEvent) -> Self {
        TrackingEvent::Hit(e)
    }
}

/// Transport wrapper for handing events to external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"tagsense-perception::lifecycle"`
    pub source: String,
    /// Session clock (seconds) at emission.
    pub session_time: f64,
    pub payload: TrackingEvent,
}

impl EventEnvelope {
    pub fn new(source: impl Into<String>, session_time: f64, payload: TrackingEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            session_time,
            payload,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failures at the edges of the stack (configuration and replay input).  The
/// tracking core itself never fails; it degrades through events.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Config I/O error at {path}: {details}")]
    ConfigIo { path: String, details: String },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Replay input error on line {line}: {details}")]
    ReplayParse { line: usize, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_defaults_apply_when_fields_missing() {
        let json = r#"{"identity":"A","position":{"x":1.0,"y":2.0,"z":3.0}}"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert!(obs.is_tracked);
        assert_eq!(obs.orientation, Quaternion::identity());
        assert_eq!(obs.frame_timestamp, 0.0);
    }

    #[test]
    fn entity_update_moves_last_pose_only() {
        let first = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        let mut entity = TrackedEntity::new("A", first, 0.5);
        entity.is_tracked = false;

        let next = Pose::new(Vec3::new(2.0, 0.0, 0.0), Quaternion::identity());
        entity.update_pose(next, 0.75);

        assert_eq!(entity.first_pose, first);
        assert_eq!(entity.last_pose, next);
        assert_eq!(entity.last_seen_timestamp, 0.75);
        assert!(entity.is_tracked);
    }

    #[test]
    fn envelope_roundtrip_keeps_payload() {
        let payload = TrackingEvent::Hit(HitEvent::HitSuccess("A".into()));
        let env = EventEnvelope::new(payload.source(), 3.0, payload);
        let json = serde_json::to_string(&env).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, env.id);
        assert_eq!(back.payload, env.payload);
        assert_eq!(back.source, "tagsense-kernel::pipeline");
    }

    #[test]
    fn lifecycle_event_exposes_entity() {
        let entity = TrackedEntity::new("B", Pose::default(), 0.0);
        let ev = LifecycleEvent::Lost(entity.clone());
        assert_eq!(ev.entity().identity, "B");
    }

    #[test]
    fn tag_error_display() {
        let err = TagError::ReplayParse { line: 7, details: "bad json".into() };
        assert!(err.to_string().contains("line 7"));
    }
}
