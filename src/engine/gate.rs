use std::time::Instant;

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::QuietWindow;

use super::state::EngineState;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Suppression flags plus remaining time, published with every snapshot so
/// the UI can always show countdowns, primary reason or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionSnapshot {
    pub flow_mode_active: bool,
    pub flow_mode_remaining_minutes: f64,
    pub snooze_active: bool,
    pub snooze_remaining_minutes: f64,
    pub quiet_active: bool,
    pub quiet_remaining_minutes: f64,
}

impl SuppressionSnapshot {
    pub fn any_active(&self) -> bool {
        self.flow_mode_active || self.snooze_active || self.quiet_active
    }
}

/// Flow mode, snooze, and quiet hours. Flow/snooze are deadline-based; quiet
/// hours are recurring local-time windows, overnight spans included.
pub struct SuppressionState {
    flow_until: Option<Instant>,
    snooze_until: Option<Instant>,
    quiet_windows: Vec<QuietWindow>,
}

impl SuppressionState {
    pub fn new(quiet_windows: Vec<QuietWindow>) -> Self {
        Self {
            flow_until: None,
            snooze_until: None,
            quiet_windows,
        }
    }

    pub fn set_quiet_windows(&mut self, windows: Vec<QuietWindow>) {
        self.quiet_windows = windows;
    }

    pub fn activate_flow(&mut self, now: Instant, minutes: f64) {
        self.flow_until = deadline(now, minutes);
    }

    pub fn cancel_flow(&mut self) {
        self.flow_until = None;
    }

    pub fn activate_snooze(&mut self, now: Instant, minutes: f64) {
        self.snooze_until = deadline(now, minutes);
    }

    pub fn cancel_snooze(&mut self) {
        self.snooze_until = None;
    }

    pub fn snooze_active(&self, now: Instant) -> bool {
        remaining_minutes(self.snooze_until, now) > 0.0
    }

    pub fn snapshot(&self, now: Instant, local_now: DateTime<Local>) -> SuppressionSnapshot {
        let flow_remaining = remaining_minutes(self.flow_until, now);
        let snooze_remaining = remaining_minutes(self.snooze_until, now);
        let (quiet_active, quiet_remaining) = self.quiet_state(local_now);

        SuppressionSnapshot {
            flow_mode_active: flow_remaining > 0.0,
            flow_mode_remaining_minutes: flow_remaining,
            snooze_active: snooze_remaining > 0.0,
            snooze_remaining_minutes: snooze_remaining,
            quiet_active,
            quiet_remaining_minutes: quiet_remaining,
        }
    }

    fn quiet_state(&self, local_now: DateTime<Local>) -> (bool, f64) {
        let current = local_now.hour() as f64 * 60.0
            + local_now.minute() as f64
            + local_now.second() as f64 / 60.0;

        for window in &self.quiet_windows {
            let start = window.start_min as f64;
            let end = window.end_min as f64;
            if start == end {
                continue;
            }
            if start < end {
                if (start..end).contains(&current) {
                    return (true, end - current);
                }
            } else {
                // Overnight window wraps past midnight.
                if current >= start {
                    return (true, end + MINUTES_PER_DAY - current);
                }
                if current < end {
                    return (true, end - current);
                }
            }
        }
        (false, 0.0)
    }
}

fn deadline(now: Instant, minutes: f64) -> Option<Instant> {
    if minutes > 0.0 {
        Some(now + std::time::Duration::from_secs_f64(minutes * 60.0))
    } else {
        None
    }
}

fn remaining_minutes(until: Option<Instant>, now: Instant) -> f64 {
    until
        .map(|deadline| deadline.saturating_duration_since(now).as_secs_f64() / 60.0)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GateDecision {
    pub fire: bool,
    /// Minutes until a reminder could next fire while prolonged; None when
    /// not applicable (not prolonged, or flow mode hides the countdown).
    pub next_reminder_minutes: Option<f64>,
}

/// Cooldown-gated reminder decision. Mutated only on a successful fire.
pub struct NotificationGate {
    last_fired_at: Option<Instant>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self {
            last_fired_at: None,
        }
    }

    pub fn evaluate(
        &mut self,
        now: Instant,
        state: EngineState,
        suppression: &SuppressionSnapshot,
        cooldown_minutes: f64,
        enabled: bool,
    ) -> GateDecision {
        if state != EngineState::ProlongedSeated {
            // Leaving the prolonged state re-arms the gate.
            self.last_fired_at = None;
            return GateDecision::default();
        }

        if suppression.snooze_active {
            return GateDecision {
                fire: false,
                next_reminder_minutes: Some(suppression.snooze_remaining_minutes),
            };
        }
        if suppression.quiet_active {
            return GateDecision {
                fire: false,
                next_reminder_minutes: Some(suppression.quiet_remaining_minutes),
            };
        }
        if !enabled || suppression.flow_mode_active {
            return GateDecision::default();
        }

        match self.last_fired_at {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_secs_f64() / 60.0;
                if elapsed >= cooldown_minutes {
                    self.last_fired_at = Some(now);
                    GateDecision {
                        fire: true,
                        next_reminder_minutes: Some(cooldown_minutes),
                    }
                } else {
                    GateDecision {
                        fire: false,
                        next_reminder_minutes: Some(cooldown_minutes - elapsed),
                    }
                }
            }
            None => {
                self.last_fired_at = Some(now);
                GateDecision {
                    fire: true,
                    next_reminder_minutes: Some(cooldown_minutes),
                }
            }
        }
    }

    /// Forget the last fire, e.g. after a sleep gap or manual refresh.
    pub fn reset(&mut self) {
        self.last_fired_at = None;
    }
}
