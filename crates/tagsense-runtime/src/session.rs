//! [`TrackingSession`] – the per-cycle orchestrator.
//!
//! Owns exactly one of each tracking component and wires them together.
//! Every call to [`TrackingSession::step`]:
//!
//! 1. **Observe** – [`LifecycleManager::process_frame`] turns the frame into
//!    `Added` / `Updated` / `Lost` events.
//! 2. **Fan out** – each `Updated` feeds the [`PoseSmoother`], the
//!    [`CalibrationLocker`] and the [`TrustMonitor`] (setup).
//! 3. **Score** – in gameplay the trust monitor scores this frame's visible
//!    set.
//! 4. **Judge** – each `Lost` is judged by the [`HitValidationPipeline`]
//!    using the trust score and visible set of this same frame.
//! 5. **Tick** – the locker closes its window if it has elapsed.
//!
//! The cycle returns lifecycle events (each accepted hit right after its
//! `Lost`), then calibration events, then trust events.  The same sequence
//! is delivered to session listeners as [`TrackingEvent`]s.
//!
//! # Example
//!
//! ```
//! use tagsense_runtime::{TagsenseConfig, TrackingSession};
//! use tagsense_types::{LifecycleEvent, Observation, Pose, TrackingEvent};
//!
//! let mut session = TrackingSession::new(TagsenseConfig::default());
//! let frame = vec![Observation::tracked("A", Pose::default(), 0.0)];
//!
//! let events = session.step(&frame, 0.0);
//! assert!(matches!(events[0], TrackingEvent::Lifecycle(LifecycleEvent::Added(_))));
//! ```

use tagsense_kernel::{GateContext, HitGate, HitValidationPipeline, Viewpoint};
use tagsense_middleware::{ListenerId, Listeners};
use tagsense_perception::{
    CalibrationLocker, LifecycleManager, PoseSmoother, TrackingView, TrustMode, TrustMonitor,
};
use tagsense_types::{HitEvent, LifecycleEvent, LockedPose, Observation, Pose, TrackedEntity, TrackingEvent};
use tracing::{debug, info_span};

use crate::config::TagsenseConfig;

pub struct TrackingSession {
    config: TagsenseConfig,
    lifecycle: LifecycleManager,
    smoother: PoseSmoother,
    calibration: CalibrationLocker,
    trust: TrustMonitor,
    hits: HitValidationPipeline,
    viewpoint: Option<Viewpoint>,
    last_now: f64,
    listeners: Listeners<TrackingEvent>,
}

impl TrackingSession {
    pub fn new(config: TagsenseConfig) -> Self {
        Self {
            lifecycle: LifecycleManager::new(config.lifecycle),
            smoother: PoseSmoother::new(config.smoother.settings),
            calibration: CalibrationLocker::new(config.calibration),
            trust: TrustMonitor::new(config.trust),
            hits: HitValidationPipeline::from_config(config.hit),
            viewpoint: None,
            last_now: 0.0,
            listeners: Listeners::new(),
            config,
        }
    }

    pub fn config(&self) -> &TagsenseConfig {
        &self.config
    }

    // ── per-cycle ───────────────────────────────────────────────────────────

    /// Advance the session by one cycle.
    pub fn step(&mut self, observations: &[Observation], now: f64) -> Vec<TrackingEvent> {
        let span = info_span!("step", now, observations = observations.len());
        let _enter = span.enter();
        self.last_now = now;

        let lifecycle_events = self.lifecycle.process_frame(observations, now);
        for event in &lifecycle_events {
            if let LifecycleEvent::Updated(entity) = event {
                self.fan_out_updated(entity, now);
            }
        }

        // Losses are judged against this frame's trust score.
        let trust_events = if self.trust.mode() == TrustMode::Gameplay {
            let visible = self.lifecycle.visible_identities();
            self.trust.evaluate(visible)
        } else {
            Vec::new()
        };

        let mut events: Vec<TrackingEvent> = Vec::with_capacity(lifecycle_events.len());
        for event in lifecycle_events {
            let hit = match &event {
                LifecycleEvent::Lost(entity) => self.judge_lost(entity, now),
                LifecycleEvent::Added(_) | LifecycleEvent::Updated(_) => None,
            };
            events.push(event.into());
            events.extend(hit.map(TrackingEvent::from));
        }

        events.extend(self.calibration.tick(now).into_iter().map(TrackingEvent::from));
        events.extend(trust_events.into_iter().map(TrackingEvent::from));

        debug!(events = events.len(), "cycle complete");
        self.publish(events)
    }

    fn fan_out_updated(&mut self, entity: &TrackedEntity, now: f64) {
        if self.config.smoother.enabled {
            self.smoother.add_sample(
                &entity.identity,
                entity.last_pose.position,
                entity.last_pose.rotation,
                now,
            );
        }
        self.calibration.handle_updated(entity);
        self.trust.handle_updated(entity, &self.lifecycle);
    }

    fn judge_lost(&mut self, entity: &TrackedEntity, now: f64) -> Option<HitEvent> {
        let ctx = self.gate_context(now);
        self.hits.handle_lost(entity, &ctx)
    }

    /// Snapshot handed to the hit gates at `now`.
    pub fn gate_context(&self, now: f64) -> GateContext {
        let trust = match self.trust.mode() {
            TrustMode::Idle => None,
            TrustMode::Setup | TrustMode::Gameplay => Some(self.trust.current_trust()),
        };
        GateContext {
            now,
            trust,
            visible_count: self.lifecycle.visible_identities().len(),
            viewpoint: self.viewpoint,
        }
    }

    // ── calibration ─────────────────────────────────────────────────────────

    pub fn begin_calibration(&mut self, now: f64) -> Vec<TrackingEvent> {
        let events = self.calibration.begin_collect(now);
        self.publish(events.into_iter().map(TrackingEvent::from).collect())
    }

    pub fn retry_calibration(&mut self, now: f64) -> Vec<TrackingEvent> {
        let events = self.calibration.retry(now);
        self.publish(events.into_iter().map(TrackingEvent::from).collect())
    }

    pub fn abort_calibration(&mut self) -> Vec<TrackingEvent> {
        let events = self.calibration.abort();
        self.publish(events.into_iter().map(TrackingEvent::from).collect())
    }

    pub fn locked_pose(&self, identity: &str) -> Option<&LockedPose> {
        self.calibration.locked_pose(identity)
    }

    // ── trust ───────────────────────────────────────────────────────────────

    pub fn begin_trust_setup(&mut self) {
        self.trust.begin_setup();
    }

    /// Freeze the known sets and score the current visible set immediately.
    pub fn begin_gameplay(&mut self) -> Vec<TrackingEvent> {
        let events = self.trust.begin_gameplay(self.lifecycle.visible_identities());
        self.publish(events.into_iter().map(TrackingEvent::from).collect())
    }

    pub fn reset_trust(&mut self) {
        self.trust.reset();
    }

    // ── hit validation ──────────────────────────────────────────────────────

    /// Insert a custom gate ahead of the timing gate.
    pub fn add_gate(&mut self, gate: Box<dyn HitGate>) {
        self.hits.add_gate(gate);
    }

    /// Observer pose for the geometric gate; `None` disables the check.
    pub fn set_viewpoint(&mut self, viewpoint: Option<Viewpoint>) {
        self.viewpoint = viewpoint;
    }

    // ── queries ─────────────────────────────────────────────────────────────

    /// Smoothed pose of a tracked marker, falling back to its last raw pose
    /// while the smoother window is thin.
    pub fn smoothed_pose(&self, identity: &str) -> Option<Pose> {
        let fallback = self.lifecycle.last_pose(identity)?;
        Some(
            self.smoother
                .smoothed_pose(identity, fallback.position, fallback.rotation),
        )
    }

    /// Cycle time passed to the most recent [`step`][Self::step].
    pub fn last_step_time(&self) -> f64 {
        self.last_now
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn smoother(&self) -> &PoseSmoother {
        &self.smoother
    }

    pub fn calibration(&self) -> &CalibrationLocker {
        &self.calibration
    }

    pub fn trust(&self) -> &TrustMonitor {
        &self.trust
    }

    pub fn hits(&self) -> &HitValidationPipeline {
        &self.hits
    }

    pub fn hits_mut(&mut self) -> &mut HitValidationPipeline {
        &mut self.hits
    }

    // ── listeners ───────────────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&TrackingEvent) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn publish(&mut self, events: Vec<TrackingEvent>) -> Vec<TrackingEvent> {
        for event in &events {
            self.listeners.emit(event);
        }
        events
    }
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new(TagsenseConfig::default())
    }
}
