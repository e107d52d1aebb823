//! [`HitValidationPipeline`] – decides whether a lost marker was hit.
//!
//! Every `Lost` event is passed through an ordered list of [`HitGate`]s; the
//! first rejection stops evaluation and the loss is silently dropped.  When
//! all gates pass the pipeline counts the hit and publishes
//! [`HitEvent::HitSuccess`].
//!
//! Gate order:
//!
//! 1. [`GeometricGate`] (if `geometric_gate`)
//! 2. [`TrustGate`] (if `trust_gate`)
//! 3. [`OrientationGate`] (if `orientation_gate`)
//! 4. custom gates, in the order they were added
//! 5. [`TimingGate`] (always last)
//!
//! # Example
//!
//! ```
//! use tagsense_kernel::{GateContext, HitPipelineConfig, HitValidationPipeline};
//! use tagsense_types::{HitEvent, Pose, TrackedEntity};
//!
//! let mut pipeline = HitValidationPipeline::from_config(HitPipelineConfig {
//!     orientation_gate: false,
//!     ..HitPipelineConfig::default()
//! });
//!
//! let lost = TrackedEntity::new("A", Pose::default(), 1.0);
//! let ctx = GateContext { now: 1.2, ..GateContext::default() };
//! assert_eq!(pipeline.handle_lost(&lost, &ctx), Some(HitEvent::HitSuccess("A".into())));
//! assert_eq!(pipeline.total_hits(), 1);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tagsense_middleware::{ListenerId, Listeners};
use tagsense_types::{HitEvent, TrackedEntity};
use tracing::{debug, info};

use crate::gate::{GateContext, GateReport, GeometricGate, HitGate, OrientationGate, TimingGate, TrustGate};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitPipelineConfig {
    pub max_loss_window_seconds: f64,
    pub max_hit_distance_meters: f32,
    pub max_angle_degrees: f32,
    pub min_trust_for_hit: f32,
    pub min_visible_during_hit: usize,
    pub min_visible_for_orientation: usize,
    pub geometric_gate: bool,
    pub trust_gate: bool,
    pub orientation_gate: bool,
}

impl Default for HitPipelineConfig {
    fn default() -> Self {
        Self {
            max_loss_window_seconds: 0.5,
            max_hit_distance_meters: 1.5,
            max_angle_degrees: 60.0,
            min_trust_for_hit: 0.6,
            min_visible_during_hit: 1,
            min_visible_for_orientation: 2,
            geometric_gate: false,
            trust_gate: false,
            orientation_gate: true,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Verdict
// ────────────────────────────────────────────────────────────────────────────

/// Result of running every gate up to (and including) the first rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitVerdict {
    pub identity: String,
    pub accepted: bool,
    pub reports: Vec<GateReport>,
}

impl HitVerdict {
    /// The report of the gate that rejected the hit, if any.
    pub fn rejected_by(&self) -> Option<&GateReport> {
        self.reports.iter().find(|r| !r.passed)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HitValidationPipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct HitValidationPipeline {
    gates: Vec<Box<dyn HitGate>>,
    timing: TimingGate,
    total_hits: u64,
    last_hit_time: Option<f64>,
    listeners: Listeners<HitEvent>,
}

impl HitValidationPipeline {
    /// Pipeline with only the timing gate.
    pub fn new(max_loss_window_seconds: f64) -> Self {
        Self {
            gates: Vec::new(),
            timing: TimingGate {
                max_loss_window_seconds,
            },
            total_hits: 0,
            last_hit_time: None,
            listeners: Listeners::new(),
        }
    }

    /// Pipeline with the built-in gates enabled by `config`.
    pub fn from_config(config: HitPipelineConfig) -> Self {
        let mut pipeline = Self::new(config.max_loss_window_seconds);
        if config.geometric_gate {
            pipeline.add_gate(Box::new(GeometricGate {
                max_distance_meters: config.max_hit_distance_meters,
                max_angle_degrees: config.max_angle_degrees,
            }));
        }
        if config.trust_gate {
            pipeline.add_gate(Box::new(TrustGate {
                min_trust: config.min_trust_for_hit,
                min_visible: config.min_visible_during_hit,
            }));
        }
        if config.orientation_gate {
            pipeline.add_gate(Box::new(OrientationGate {
                min_visible: config.min_visible_for_orientation,
            }));
        }
        pipeline
    }

    /// Append a gate.  It runs after every gate added before it and before
    /// the timing gate.
    pub fn add_gate(&mut self, gate: Box<dyn HitGate>) {
        debug!(gate = gate.name(), "hit gate added");
        self.gates.push(gate);
    }

    /// Names of all gates in evaluation order.
    pub fn gate_names(&self) -> Vec<&str> {
        self.gates
            .iter()
            .map(|g| g.name())
            .chain(std::iter::once(self.timing.name()))
            .collect()
    }

    /// Run the gates against `entity` without recording anything.
    pub fn validate(&self, entity: &TrackedEntity, ctx: &GateContext) -> HitVerdict {
        let mut reports = Vec::new();
        let gates = self
            .gates
            .iter()
            .map(|g| g.as_ref())
            .chain(std::iter::once(&self.timing as &dyn HitGate));

        for gate in gates {
            let report = gate.evaluate(entity, ctx);
            let passed = report.passed;
            reports.push(report);
            if !passed {
                return HitVerdict {
                    identity: entity.identity.clone(),
                    accepted: false,
                    reports,
                };
            }
        }

        HitVerdict {
            identity: entity.identity.clone(),
            accepted: true,
            reports,
        }
    }

    /// Validate a lost entity and, on success, record and publish the hit.
    pub fn handle_lost(&mut self, entity: &TrackedEntity, ctx: &GateContext) -> Option<HitEvent> {
        let verdict = self.validate(entity, ctx);
        if let Some(report) = verdict.rejected_by() {
            debug!(
                identity = %entity.identity,
                gate = %report.gate,
                measurements = ?report.measurements,
                "hit rejected"
            );
            return None;
        }

        self.total_hits += 1;
        self.last_hit_time = Some(ctx.now);
        info!(
            identity = %entity.identity,
            total_hits = self.total_hits,
            lost_s = TimingGate::lost_duration(entity, ctx.now),
            "hit"
        );

        let event = HitEvent::HitSuccess(entity.identity.clone());
        self.listeners.emit(&event);
        Some(event)
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Cycle time of the most recent accepted hit.
    pub fn last_hit_time(&self) -> Option<f64> {
        self.last_hit_time
    }

    pub fn reset_statistics(&mut self) {
        self.total_hits = 0;
        self.last_hit_time = None;
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&HitEvent) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl Default for HitValidationPipeline {
    fn default() -> Self {
        Self::from_config(HitPipelineConfig::default())
    }
}

impl fmt::Debug for HitValidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitValidationPipeline")
            .field("gates", &self.gate_names())
            .field("total_hits", &self.total_hits)
            .field("last_hit_time", &self.last_hit_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Measurement, Viewpoint};
    use tagsense_middleware::EventRecorder;
    use tagsense_types::{Pose, Quaternion, Vec3};

    fn lost(identity: &str, last_seen: f64) -> TrackedEntity {
        let mut e = TrackedEntity::new(identity, Pose::new(Vec3::new(0.0, 0.0, 1.0), Quaternion::identity()), last_seen);
        e.is_tracked = false;
        e
    }

    fn ctx(now: f64, visible_count: usize) -> GateContext {
        GateContext {
            now,
            visible_count,
            ..GateContext::default()
        }
    }

    struct RejectAll;

    impl HitGate for RejectAll {
        fn name(&self) -> &str {
            "reject_all"
        }

        fn evaluate(&self, _entity: &TrackedEntity, _ctx: &GateContext) -> GateReport {
            GateReport::fail(self.name(), vec![Measurement::new("always", 1.0, 0.0)])
        }
    }

    #[test]
    fn default_pipeline_runs_orientation_then_timing() {
        let pipeline = HitValidationPipeline::default();
        assert_eq!(pipeline.gate_names(), vec!["orientation", "timing"]);
    }

    #[test]
    fn all_gates_enabled_follow_fixed_order() {
        let mut pipeline = HitValidationPipeline::from_config(HitPipelineConfig {
            geometric_gate: true,
            trust_gate: true,
            ..HitPipelineConfig::default()
        });
        pipeline.add_gate(Box::new(RejectAll));
        assert_eq!(
            pipeline.gate_names(),
            vec!["geometric", "trust", "orientation", "reject_all", "timing"]
        );
    }

    #[test]
    fn hit_within_window_succeeds() {
        let mut pipeline = HitValidationPipeline::default();
        let event = pipeline.handle_lost(&lost("A", 1.0), &ctx(1.3, 2));
        assert_eq!(event, Some(HitEvent::HitSuccess("A".to_string())));
        assert_eq!(pipeline.total_hits(), 1);
        assert_eq!(pipeline.last_hit_time(), Some(1.3));
    }

    #[test]
    fn loss_just_past_window_is_rejected() {
        let mut pipeline = HitValidationPipeline::default();
        let verdict = pipeline.validate(&lost("A", 1.0), &ctx(1.0 + 0.5 + 0.01, 2));
        assert!(!verdict.accepted);
        assert_eq!(verdict.rejected_by().map(|r| r.gate.as_str()), Some("timing"));
        assert!(pipeline.handle_lost(&lost("A", 1.0), &ctx(1.51, 2)).is_none());
        assert_eq!(pipeline.total_hits(), 0);
    }

    #[test]
    fn first_failure_short_circuits() {
        let pipeline = HitValidationPipeline::default();
        // Only one marker in view: orientation rejects, timing never runs.
        let verdict = pipeline.validate(&lost("A", 1.0), &ctx(1.1, 1));
        assert!(!verdict.accepted);
        assert_eq!(verdict.reports.len(), 1);
        assert_eq!(verdict.reports[0].gate, "orientation");
    }

    #[test]
    fn custom_gate_runs_before_timing() {
        let mut pipeline = HitValidationPipeline::new(10.0);
        pipeline.add_gate(Box::new(RejectAll));
        let verdict = pipeline.validate(&lost("A", 0.0), &ctx(0.1, 5));
        assert_eq!(verdict.rejected_by().map(|r| r.gate.as_str()), Some("reject_all"));
    }

    #[test]
    fn geometric_gate_uses_viewpoint() {
        let mut pipeline = HitValidationPipeline::from_config(HitPipelineConfig {
            geometric_gate: true,
            orientation_gate: false,
            ..HitPipelineConfig::default()
        });
        let mut facing_away = ctx(1.1, 2);
        facing_away.viewpoint = Some(Viewpoint {
            position: Vec3::zero(),
            forward: Vec3::new(0.0, 0.0, -1.0),
        });
        assert!(pipeline.handle_lost(&lost("A", 1.0), &facing_away).is_none());

        // Without a viewpoint the geometric gate passes.
        assert!(pipeline.handle_lost(&lost("A", 1.0), &ctx(1.1, 0)).is_some());
    }

    #[test]
    fn validate_has_no_side_effects() {
        let pipeline = HitValidationPipeline::default();
        let verdict = pipeline.validate(&lost("A", 1.0), &ctx(1.1, 2));
        assert!(verdict.accepted);
        assert_eq!(pipeline.total_hits(), 0);
        assert_eq!(pipeline.last_hit_time(), None);
    }

    #[test]
    fn reset_statistics_clears_counters() {
        let mut pipeline = HitValidationPipeline::default();
        pipeline.handle_lost(&lost("A", 1.0), &ctx(1.1, 2));
        pipeline.reset_statistics();
        assert_eq!(pipeline.total_hits(), 0);
        assert_eq!(pipeline.last_hit_time(), None);
    }

    #[test]
    fn listeners_receive_hits() {
        let mut pipeline = HitValidationPipeline::default();
        let recorder = EventRecorder::new();
        pipeline.subscribe(recorder.listener());
        pipeline.handle_lost(&lost("A", 1.0), &ctx(1.1, 2));
        pipeline.handle_lost(&lost("B", 1.0), &ctx(5.0, 2));
        assert_eq!(recorder.take(), vec![HitEvent::HitSuccess("A".to_string())]);
    }
}
