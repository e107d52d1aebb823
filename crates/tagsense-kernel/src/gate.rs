//! [`HitGate`] – a single accept/reject predicate applied to a lost marker.
//!
//! A gate looks at the [`TrackedEntity`] as it was when it went missing plus
//! a [`GateContext`] snapshot of the rest of the world, and returns a
//! [`GateReport`] with its verdict and the numbers it measured.  Gates are
//! pure: evaluating one never changes anything.
//!
//! Four built-in gates are provided:
//! - [`GeometricGate`] – the marker was within reach and in front of the
//!   viewpoint.
//! - [`TrustGate`] – the co-visibility trust score and the visible count were
//!   high enough.
//! - [`OrientationGate`] – enough markers were in view for the viewpoint to
//!   be pointed at the play area.
//! - [`TimingGate`] – the marker went missing recently enough.

use serde::{Deserialize, Serialize};
use tagsense_types::{TrackedEntity, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Context & reports
// ────────────────────────────────────────────────────────────────────────────

/// Observer position and viewing direction in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub position: Vec3,
    pub forward: Vec3,
}

/// Everything a gate may consult besides the entity itself.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GateContext {
    /// Cycle clock at which the loss is being judged.
    pub now: f64,
    /// Current trust score, or `None` when no trust monitor is running.
    pub trust: Option<f32>,
    /// Number of markers tracked in the current frame.
    pub visible_count: usize,
    pub viewpoint: Option<Viewpoint>,
}

/// One number a gate compared against its limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    pub limit: f64,
}

impl Measurement {
    pub fn new(name: &str, value: f64, limit: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
            limit,
        }
    }
}

/// Outcome of a single gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub gate: String,
    pub passed: bool,
    /// `true` when a missing collaborator made the gate pass without checking.
    pub skipped: bool,
    pub measurements: Vec<Measurement>,
}

impl GateReport {
    pub fn pass(gate: &str, measurements: Vec<Measurement>) -> Self {
        Self {
            gate: gate.to_string(),
            passed: true,
            skipped: false,
            measurements,
        }
    }

    pub fn fail(gate: &str, measurements: Vec<Measurement>) -> Self {
        Self {
            gate: gate.to_string(),
            passed: false,
            skipped: false,
            measurements,
        }
    }

    pub fn skipped(gate: &str) -> Self {
        Self {
            gate: gate.to_string(),
            passed: true,
            skipped: true,
            measurements: Vec::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HitGate trait
// ────────────────────────────────────────────────────────────────────────────

/// A single hit-validation predicate.
///
/// Implement this trait to add custom checks to a
/// [`HitValidationPipeline`][crate::pipeline::HitValidationPipeline] via
/// [`add_gate`][crate::pipeline::HitValidationPipeline::add_gate].
pub trait HitGate: Send + Sync {
    /// Short name used in reports and logs.
    fn name(&self) -> &str;

    fn evaluate(&self, entity: &TrackedEntity, ctx: &GateContext) -> GateReport;
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in gates
// ────────────────────────────────────────────────────────────────────────────

/// Rejects losses of markers that were too far from the viewpoint or too far
/// off its forward axis.  Passes (skipped) without a viewpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricGate {
    pub max_distance_meters: f32,
    pub max_angle_degrees: f32,
}

impl HitGate for GeometricGate {
    fn name(&self) -> &str {
        "geometric"
    }

    fn evaluate(&self, entity: &TrackedEntity, ctx: &GateContext) -> GateReport {
        let Some(view) = ctx.viewpoint else {
            return GateReport::skipped(self.name());
        };

        let target = entity.last_pose.position;
        let distance = view.position.distance(target);
        let angle = angle_degrees(view.forward, target.sub(view.position));

        let measurements = vec![
            Measurement::new("distance_m", f64::from(distance), f64::from(self.max_distance_meters)),
            Measurement::new("angle_deg", f64::from(angle), f64::from(self.max_angle_degrees)),
        ];
        if distance > self.max_distance_meters || angle > self.max_angle_degrees {
            GateReport::fail(self.name(), measurements)
        } else {
            GateReport::pass(self.name(), measurements)
        }
    }
}

/// Angle between two directions in degrees.  A zero-length input yields `0`.
fn angle_degrees(a: Vec3, b: Vec3) -> f32 {
    match (a.normalized(), b.normalized()) {
        (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0).acos().to_degrees(),
        _ => 0.0,
    }
}

/// Rejects losses while trust is low or too few markers are visible.  The
/// trust half passes when no trust score is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustGate {
    pub min_trust: f32,
    pub min_visible: usize,
}

impl HitGate for TrustGate {
    fn name(&self) -> &str {
        "trust"
    }

    fn evaluate(&self, _entity: &TrackedEntity, ctx: &GateContext) -> GateReport {
        let mut measurements = vec![Measurement::new(
            "visible",
            ctx.visible_count as f64,
            self.min_visible as f64,
        )];
        let mut passed = ctx.visible_count >= self.min_visible;

        if let Some(trust) = ctx.trust {
            measurements.push(Measurement::new("trust", f64::from(trust), f64::from(self.min_trust)));
            passed &= trust >= self.min_trust;
        }

        if passed {
            GateReport::pass(self.name(), measurements)
        } else {
            GateReport::fail(self.name(), measurements)
        }
    }
}

/// Rejects losses unless at least `min_visible` markers are in view, i.e. the
/// viewer is facing the play area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationGate {
    pub min_visible: usize,
}

impl HitGate for OrientationGate {
    fn name(&self) -> &str {
        "orientation"
    }

    fn evaluate(&self, _entity: &TrackedEntity, ctx: &GateContext) -> GateReport {
        let measurements = vec![Measurement::new(
            "visible",
            ctx.visible_count as f64,
            self.min_visible as f64,
        )];
        if ctx.visible_count >= self.min_visible {
            GateReport::pass(self.name(), measurements)
        } else {
            GateReport::fail(self.name(), measurements)
        }
    }
}

/// Rejects losses older than `max_loss_window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingGate {
    pub max_loss_window_seconds: f64,
}

impl TimingGate {
    pub fn lost_duration(entity: &TrackedEntity, now: f64) -> f64 {
        now - entity.last_seen_timestamp
    }
}

impl HitGate for TimingGate {
    fn name(&self) -> &str {
        "timing"
    }

    fn evaluate(&self, entity: &TrackedEntity, ctx: &GateContext) -> GateReport {
        let lost = Self::lost_duration(entity, ctx.now);
        let measurements = vec![Measurement::new("lost_s", lost, self.max_loss_window_seconds)];
        if lost <= self.max_loss_window_seconds {
            GateReport::pass(self.name(), measurements)
        } else {
            GateReport::fail(self.name(), measurements)
        }
    }
}
