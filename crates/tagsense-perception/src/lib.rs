//! `tagsense-perception` – per-marker tracking state.
//!
//! Turns the noisy per-frame observation stream into stable marker state that
//! the rest of the stack can reason about.
//!
//! # Modules
//!
//! - [`lifecycle`] – [`LifecycleManager`][lifecycle::LifecycleManager]: sole
//!   owner of the tracked-entity table; emits `Added` / `Updated` / `Lost`
//!   with a grace timeout for brief occlusions.
//! - [`smoother`] – [`PoseSmoother`][smoother::PoseSmoother]: rolling-window,
//!   IQR-trimmed pose average per marker.
//! - [`calibration`] – [`CalibrationLocker`][calibration::CalibrationLocker]:
//!   one-shot collection window that freezes a robust pose per marker.
//! - [`trust`] – [`TrustMonitor`][trust::TrustMonitor]: learns which markers
//!   are seen together during setup and scores the live visible set against
//!   that during gameplay.
//! - [`robust`] – the nearest-rank IQR statistics shared by the smoother and
//!   the locker.

pub mod calibration;
pub mod lifecycle;
pub mod robust;
pub mod smoother;
pub mod trust;

pub use calibration::{CalibrationConfig, CalibrationLocker, CalibrationState};
pub use lifecycle::{LifecycleConfig, LifecycleManager, TrackingView};
pub use smoother::{PoseSmoother, SmootherConfig};
pub use trust::{TrustConfig, TrustMode, TrustMonitor};
