use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineState {
    Active,
    ShortBreak,
    ProlongedSeated,
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Active
    }
}

/// One uninterrupted stretch of seated time, measured from the last
/// seated-timer zero-crossing.
#[derive(Debug, Clone, Copy)]
pub struct SeatedSession {
    pub id: Uuid,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: EngineState,
    pub to: EngineState,
}

/// Result of one state-machine evaluation.
#[derive(Debug, Clone, Copy)]
pub struct MachineTick {
    pub state: EngineState,
    pub seated_minutes: f64,
    pub break_minutes: f64,
    pub transition: Option<Transition>,
    /// Set when this tick closed a seated session (absence or reset).
    pub closed_session_minutes: Option<f64>,
}

/// Seated/break timers and the ACTIVE / SHORT_BREAK / PROLONGED_SEATED
/// transitions. Evaluated exactly once per engine tick; this is the single
/// place timers reset.
pub struct StateMachine {
    state: EngineState,
    seated_anchor: Option<Instant>,
    session: Option<SeatedSession>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: EngineState::Active,
            seated_anchor: None,
            session: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn session(&self) -> Option<&SeatedSession> {
        self.session.as_ref()
    }

    /// Evaluate timers against the latest activity evidence.
    ///
    /// `last_activity_at` is the newest moment the user was demonstrably
    /// there (input, or a confident present snapshot). `absence_override`
    /// marks an authoritative vision absence: the break timer is forced to
    /// at least the reset threshold so the seated timer resets this tick.
    pub fn tick(
        &mut self,
        now: Instant,
        last_activity_at: Option<Instant>,
        absence_override: bool,
        break_reset_minutes: f64,
        prolonged_seated_minutes: f64,
    ) -> MachineTick {
        let mut break_minutes = match last_activity_at {
            Some(at) => now.saturating_duration_since(at).as_secs_f64() / 60.0,
            // Never seen any activity: nobody is there.
            None => break_reset_minutes,
        };
        if absence_override {
            break_minutes = break_minutes.max(break_reset_minutes);
        }

        let mut closed_session_minutes = None;
        if break_minutes >= break_reset_minutes {
            closed_session_minutes = self.close_session(now);
        } else if self.seated_anchor.is_none() {
            let anchor = last_activity_at.unwrap_or(now);
            self.seated_anchor = Some(anchor);
            let session = SeatedSession {
                id: Uuid::new_v4(),
                started_at: anchor,
            };
            log_info!("seated session {} started", session.id);
            self.session = Some(session);
        }

        let seated_minutes = self
            .seated_anchor
            .map(|anchor| now.saturating_duration_since(anchor).as_secs_f64() / 60.0)
            .unwrap_or(0.0);

        let next = if break_minutes >= break_reset_minutes {
            EngineState::ShortBreak
        } else if seated_minutes >= prolonged_seated_minutes {
            EngineState::ProlongedSeated
        } else {
            EngineState::Active
        };

        let transition = (next != self.state).then_some(Transition {
            from: self.state,
            to: next,
        });
        self.state = next;

        MachineTick {
            state: next,
            seated_minutes,
            break_minutes,
            transition,
            closed_session_minutes,
        }
    }

    /// Zero the seated timer without waiting for real break time to elapse.
    /// Used by the manual "refresh seated timer" command and by sleep/wake
    /// discontinuities.
    pub fn reset(&mut self, now: Instant) {
        self.close_session(now);
        self.state = EngineState::ShortBreak;
    }

    fn close_session(&mut self, now: Instant) -> Option<f64> {
        self.seated_anchor = None;
        self.session.take().map(|session| {
            let minutes = now.saturating_duration_since(session.started_at).as_secs_f64() / 60.0;
            log_info!("seated session {} closed after {:.1} min", session.id, minutes);
            minutes
        })
    }
}
