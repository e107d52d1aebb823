//! `tagsense-kernel` – hit validation.
//!
//! Decides whether a marker that just went missing was actually struck.  It
//! does not track anything; it applies rules to what perception reports.
//!
//! # Modules
//!
//! - [`gate`] – the [`HitGate`][gate::HitGate] trait, the
//!   [`GateContext`][gate::GateContext] snapshot handed to every gate, and the
//!   four built-in gates (geometric, trust, orientation, timing).
//! - [`pipeline`] – [`HitValidationPipeline`][pipeline::HitValidationPipeline]:
//!   runs the gates in a fixed order with short-circuit on the first
//!   rejection, counts hits and publishes `HitSuccess`.

pub mod gate;
pub mod pipeline;

pub use gate::{
    GateContext, GateReport, GeometricGate, HitGate, Measurement, OrientationGate, TimingGate, TrustGate,
    Viewpoint,
};
pub use pipeline::{HitPipelineConfig, HitValidationPipeline, HitVerdict};
