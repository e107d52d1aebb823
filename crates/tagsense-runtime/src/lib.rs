//! `tagsense-runtime` – wires the tracking stack together.
//!
//! # Modules
//!
//! - [`session`] – [`TrackingSession`][session::TrackingSession]: owns one
//!   lifecycle manager, smoother, calibration locker, trust monitor and hit
//!   pipeline, and drives them once per cycle in a fixed order.
//! - [`config`] – [`TagsenseConfig`][config::TagsenseConfig]: TOML
//!   configuration with per-section defaults and `TAGSENSE_*` environment
//!   overrides.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to ship spans to any OTLP collector.

pub mod config;
pub mod session;
pub mod telemetry;

pub use config::TagsenseConfig;
pub use session::TrackingSession;
