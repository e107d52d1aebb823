//! `tagsense-middleware` – The Nervous System
//!
//! Routes events from the tracking components to whoever listens, without
//! caring about the data's meaning.
//!
//! # Modules
//!
//! - [`listeners`] – synchronous, in-process observer registry.  Every
//!   tracking component owns one [`Listeners`] per event type and dispatches
//!   to it in registration order within the same call that produced the
//!   event.

pub mod listeners;

pub use listeners::{EventRecorder, ListenerId, Listeners};
