//! Replay of recorded observation logs.
//!
//! A log is JSON Lines, one frame per line:
//!
//! ```text
//! {"now": 0.0, "observations": [{"identity": "A", "position": {"x": 0.0, "y": 0.0, "z": 1.0}}]}
//! {"now": 0.1, "observations": []}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::io::BufRead;

use serde::Deserialize;
use tagsense_runtime::TrackingSession;
use tagsense_types::{Observation, TagError, TrackingEvent};
use tracing::info;

/// One recorded cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFrame {
    pub now: f64,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// Parse a JSON Lines log.  Line numbers in errors are 1-based.
pub fn parse_frames<R: BufRead>(reader: R) -> Result<Vec<ReplayFrame>, TagError> {
    let mut frames = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| TagError::ReplayParse {
            line: line_no,
            details: e.to_string(),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let frame: ReplayFrame = serde_json::from_str(trimmed).map_err(|e| TagError::ReplayParse {
            line: line_no,
            details: e.to_string(),
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// When the replay switches phases.
///
/// With `setup_until` set, trust setup and a calibration window start at the
/// first frame.  Gameplay starts at the first frame whose `now` reaches
/// `gameplay_from`, or `setup_until` when `gameplay_from` is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayPlan {
    pub setup_until: Option<f64>,
    pub gameplay_from: Option<f64>,
}

impl ReplayPlan {
    fn gameplay_at(&self) -> Option<f64> {
        self.gameplay_from.or(self.setup_until)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub events: usize,
    pub detections: u64,
    pub hits: u64,
    pub locked_poses: usize,
    pub final_trust: f32,
}

/// Drive `session` through `frames`, handing every event to `sink` together
/// with the cycle time it was emitted at.
pub fn run<F>(session: &mut TrackingSession, frames: &[ReplayFrame], plan: ReplayPlan, mut sink: F) -> ReplaySummary
where
    F: FnMut(f64, &TrackingEvent),
{
    let mut events = 0usize;
    let mut in_gameplay = false;

    if let (Some(first), Some(_)) = (frames.first(), plan.setup_until) {
        session.begin_trust_setup();
        for event in session.begin_calibration(first.now) {
            sink(first.now, &event);
            events += 1;
        }
    }

    for frame in frames {
        for event in session.step(&frame.observations, frame.now) {
            sink(frame.now, &event);
            events += 1;
        }

        if !in_gameplay && plan.gameplay_at().is_some_and(|at| frame.now >= at) {
            in_gameplay = true;
            info!(now = frame.now, "switching to gameplay");
            for event in session.begin_gameplay() {
                sink(frame.now, &event);
                events += 1;
            }
        }
    }

    ReplaySummary {
        frames: frames.len(),
        events,
        detections: session.lifecycle().detection_count(),
        hits: session.hits().total_hits(),
        locked_poses: session.calibration().locked_pose_count(),
        final_trust: session.trust().current_trust(),
    }
}
