use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single keyboard/mouse activity sample. Ephemeral: lives in the
/// [`SignalBuffer`](super::SignalBuffer) until it ages out of the horizon.
#[derive(Debug, Clone, Copy)]
pub struct InputEvent {
    pub at: Instant,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostureState {
    Upright,
    Slouch,
    Uncertain,
    Untracked,
}

impl Default for PostureState {
    fn default() -> Self {
        PostureState::Untracked
    }
}

/// One camera-derived presence/posture judgment, produced externally by the
/// vision subsystem in response to a probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub captured_at: DateTime<Utc>,
    pub presence: bool,
    /// Detector confidence in [0, 1]; below the configured threshold the
    /// snapshot is advisory only.
    pub confidence: f64,
    pub posture_state: PostureState,
    pub posture_score: f64,
}

impl PresenceSnapshot {
    pub fn present(confidence: f64, posture_state: PostureState, posture_score: f64) -> Self {
        Self {
            captured_at: Utc::now(),
            presence: true,
            confidence,
            posture_state,
            posture_score,
        }
    }

    pub fn absent(confidence: f64) -> Self {
        Self {
            captured_at: Utc::now(),
            presence: false,
            confidence,
            posture_state: PostureState::Untracked,
            posture_score: 0.0,
        }
    }
}
