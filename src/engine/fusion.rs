use std::time::{Duration, Instant};

use crate::signals::{PostureState, PresenceSnapshot};

use super::state::EngineState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

/// What the fusion layer currently believes about the user's presence.
#[derive(Debug, Clone, Copy)]
pub struct FusionReading {
    pub presence_confidence: f64,
    pub posture_state: PostureState,
    /// Present only when a fresh snapshot is confidently tracking posture.
    pub posture_score: Option<f64>,
    /// Newest moment vision confidently saw the user present. Feeds the
    /// break timer so reading/watching without typing stays ACTIVE.
    pub present_hint_at: Option<Instant>,
    /// Fresh, confident, presence=false: forces a seated-timer reset.
    pub authoritative_absence: bool,
}

/// Inputs `should_request_probe` needs from the current tick.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext {
    pub state: EngineState,
    pub seated_minutes: f64,
    pub break_minutes: f64,
}

/// Combines duty-cycled vision snapshots with input recency and decides when
/// the camera is worth waking up. At most one probe is outstanding; a probe
/// that never resolves is timed out by the tick loop, never awaited.
pub struct PresenceFusion {
    vision_enabled: bool,
    capture_interval: Duration,
    probe_cooldown: Duration,
    ambiguous_silence: Duration,
    presence_threshold: f64,

    last_snapshot: Option<(Instant, PresenceSnapshot)>,
    last_present_at: Option<Instant>,
    outstanding_since: Option<Instant>,
    last_request_at: Option<Instant>,
    last_completed_at: Option<Instant>,
}

/// Snapshots below this confidence carry no posture information at all.
const MIN_POSTURE_CONFIDENCE: f64 = 0.05;

/// Fraction of the prolonged threshold at which presence gets re-confirmed.
const NEAR_THRESHOLD_RATIO: f64 = 0.95;

impl PresenceFusion {
    pub fn new(
        vision_enabled: bool,
        capture_interval: Duration,
        probe_cooldown: Duration,
        ambiguous_silence: Duration,
        presence_threshold: f64,
    ) -> Self {
        Self {
            vision_enabled,
            capture_interval,
            probe_cooldown,
            ambiguous_silence,
            presence_threshold,
            last_snapshot: None,
            last_present_at: None,
            outstanding_since: None,
            last_request_at: None,
            last_completed_at: None,
        }
    }

    pub fn reconfigure(
        &mut self,
        vision_enabled: bool,
        capture_interval: Duration,
        probe_cooldown: Duration,
        ambiguous_silence: Duration,
        presence_threshold: f64,
    ) {
        if self.vision_enabled && !vision_enabled {
            self.reset();
        }
        self.vision_enabled = vision_enabled;
        self.capture_interval = capture_interval;
        self.probe_cooldown = probe_cooldown;
        self.ambiguous_silence = ambiguous_silence;
        self.presence_threshold = presence_threshold;
    }

    /// Ingest a snapshot. Resolves the outstanding probe slot if one is
    /// pending; unsolicited snapshots (an external continuous source) are
    /// accepted the same way.
    pub fn accept(&mut self, received_at: Instant, snapshot: PresenceSnapshot) {
        // With vision disabled, presence is input-derived only.
        if !self.vision_enabled {
            return;
        }
        if snapshot.presence
            && snapshot.confidence >= self.presence_threshold
            && snapshot.posture_state != PostureState::Untracked
        {
            self.last_present_at = Some(match self.last_present_at {
                Some(prev) => prev.max(received_at),
                None => received_at,
            });
        }

        self.last_snapshot = Some((received_at, snapshot));

        if self.outstanding_since.take().is_some() {
            self.last_completed_at = Some(received_at);
            log_info!(
                "vision probe resolved: presence={} confidence={:.2}",
                snapshot.presence,
                snapshot.confidence
            );
        }
    }

    /// Expire the outstanding probe once it has gone unanswered for
    /// `timeout`. Returns true when the slot was dropped this call.
    pub fn poll_timeout(&mut self, now: Instant, timeout: Duration) -> bool {
        match self.outstanding_since {
            Some(since) if now.saturating_duration_since(since) >= timeout => {
                self.outstanding_since = None;
                self.last_completed_at = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn probe_outstanding(&self) -> bool {
        self.outstanding_since.is_some()
    }

    pub fn evaluate(&self, now: Instant) -> FusionReading {
        let fresh = self.last_snapshot.filter(|(received_at, _)| {
            now.saturating_duration_since(*received_at) <= self.capture_interval * 2
        });

        match fresh {
            Some((_, snapshot)) => {
                let tracked = snapshot.posture_state != PostureState::Untracked
                    && snapshot.confidence > MIN_POSTURE_CONFIDENCE;
                FusionReading {
                    presence_confidence: snapshot.confidence,
                    posture_state: snapshot.posture_state,
                    posture_score: tracked.then_some(snapshot.posture_score),
                    present_hint_at: self.last_present_at,
                    authoritative_absence: !snapshot.presence
                        && snapshot.confidence >= self.presence_threshold,
                }
            }
            // Stale or missing snapshots fall back to input-derived presence.
            None => FusionReading {
                presence_confidence: 0.0,
                posture_state: PostureState::Untracked,
                posture_score: None,
                present_hint_at: self.last_present_at,
                authoritative_absence: false,
            },
        }
    }

    /// Decide whether this tick should wake the camera. On `true` the probe
    /// slot is marked outstanding; the caller performs the actual request.
    pub fn should_request_probe(
        &mut self,
        now: Instant,
        ctx: ProbeContext,
        prolonged_seated_minutes: f64,
        break_reset_minutes: f64,
    ) -> bool {
        if !self.vision_enabled || self.outstanding_since.is_some() {
            return false;
        }

        // Already confidently tracking: nothing to confirm.
        let reading = self.evaluate(now);
        if reading.presence_confidence >= self.presence_threshold
            && reading.posture_state != PostureState::Untracked
        {
            return false;
        }

        let break_secs = ctx.break_minutes * 60.0;
        let ambiguous_silence = break_secs >= self.ambiguous_silence.as_secs_f64()
            && ctx.break_minutes < break_reset_minutes;
        let near_threshold = ctx.state == EngineState::Active
            && ctx.seated_minutes >= prolonged_seated_minutes * NEAR_THRESHOLD_RATIO;

        if !ambiguous_silence && !near_threshold {
            return false;
        }

        if let Some(last) = self.last_request_at {
            if now.saturating_duration_since(last) < self.capture_interval {
                return false;
            }
        }
        if let Some(completed) = self.last_completed_at {
            if now.saturating_duration_since(completed) < self.probe_cooldown {
                return false;
            }
        }

        self.last_request_at = Some(now);
        self.outstanding_since = Some(now);
        log_info!(
            "requesting vision probe (seated={:.1}min break={:.1}min)",
            ctx.seated_minutes,
            ctx.break_minutes
        );
        true
    }

    /// Drop everything, including an outstanding probe. A late result will
    /// be discarded because the slot is no longer pending.
    pub fn reset(&mut self) {
        self.last_snapshot = None;
        self.last_present_at = None;
        self.outstanding_since = None;
        self.last_request_at = None;
        self.last_completed_at = None;
    }
}
