use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::config::{ConfigError, EngineConfig};
use crate::reminders::{Reminder, ReminderPool};
use crate::signals::{PostureState, SignalBuffer};

use super::daily::{DailyAggregator, DailyStats};
use super::fusion::{PresenceFusion, ProbeContext};
use super::gate::{NotificationGate, SuppressionSnapshot, SuppressionState};
use super::inbox::{Command, EngineEvent};
use super::score::score;
use super::state::{EngineState, StateMachine};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub activity_sum: f64,
    pub normalized_activity: f64,
    pub seated_minutes: f64,
    pub break_minutes: f64,
    pub presence_confidence: f64,
    pub posture_score: f64,
    pub posture_state: PostureState,
}

/// Immutable published view of the engine. External consumers (status bar,
/// dashboard) only ever see these copies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub score: f64,
    pub state: EngineState,
    pub metrics: SnapshotMetrics,
    pub daily: DailyStats,
    pub suppression: SuppressionSnapshot,
    /// Minutes until a reminder could next fire, when meaningful.
    pub next_reminder_minutes: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Everything one tick produced; the controller publishes the snapshot and
/// acts on the rest.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub snapshot: EngineSnapshot,
    pub reminder: Option<Reminder>,
    pub request_probe: bool,
}

/// The composite engine. Owned exclusively by the controller; `tick` is the
/// only mutation point, so transitions are never interleaved.
pub struct EngineCore {
    config: EngineConfig,
    buffer: Arc<SignalBuffer>,
    machine: StateMachine,
    fusion: PresenceFusion,
    daily: DailyAggregator,
    suppression: SuppressionState,
    gate: NotificationGate,
    reminders: ReminderPool,
    last_tick_at: Option<Instant>,
    last_wall_at: Option<DateTime<Local>>,
}

impl EngineCore {
    pub fn new(
        config: EngineConfig,
        buffer: Arc<SignalBuffer>,
        wall_now: DateTime<Local>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let quiet_windows = config.parsed_quiet_hours()?;
        let fusion = PresenceFusion::new(
            config.vision_enabled,
            Duration::from_secs_f64(config.vision_capture_interval_seconds),
            Duration::from_secs_f64(config.probe_cooldown_seconds),
            Duration::from_secs_f64(config.ambiguous_silence_seconds),
            config.vision_presence_threshold,
        );

        Ok(Self {
            daily: DailyAggregator::new(wall_now.date_naive()),
            suppression: SuppressionState::new(quiet_windows),
            gate: NotificationGate::new(),
            reminders: ReminderPool::new(),
            machine: StateMachine::new(),
            fusion,
            buffer,
            config,
            last_tick_at: None,
            last_wall_at: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn probe_outstanding(&self) -> bool {
        self.fusion.probe_outstanding()
    }

    /// The probe channel died without a result (source dropped, hardware
    /// unavailable): free the slot right away instead of waiting out the
    /// timeout.
    pub fn cancel_probe(&mut self, now: Instant) {
        if self.fusion.poll_timeout(now, Duration::ZERO) {
            log_warn!("vision probe source dropped without a result");
        }
    }

    /// Snapshot for consumers before the first tick has run.
    pub fn initial_snapshot(&self, wall_now: DateTime<Local>) -> EngineSnapshot {
        self.build_snapshot(
            0.0,
            EngineState::Active,
            SnapshotMetrics {
                activity_sum: 0.0,
                normalized_activity: 0.0,
                seated_minutes: 0.0,
                break_minutes: 0.0,
                presence_confidence: 0.0,
                posture_score: 1.0,
                posture_state: PostureState::Untracked,
            },
            SuppressionSnapshot::default(),
            None,
            wall_now,
        )
    }

    /// Evaluate one tick: consume the drained inbox, fold in signals, run
    /// the state machine, and decide on reminders and probes.
    pub fn tick(
        &mut self,
        now: Instant,
        wall_now: DateTime<Local>,
        events: Vec<EngineEvent>,
    ) -> TickOutput {
        let delta_secs = self
            .last_tick_at
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick_at = Some(now);

        // Suspend stalls the monotonic clock, so a sleep gap is only visible
        // on the wall clock: a huge (or backward) wall jump between ticks is
        // an unmeasured absence, not seated time.
        let gap_limit = self.config.sleep_gap_multiplier * self.config.tick_interval_seconds;
        let wall_delta_secs = self
            .last_wall_at
            .map(|last| (wall_now - last).num_milliseconds() as f64 / 1000.0);
        self.last_wall_at = Some(wall_now);

        let mut reset_requested = false;
        if let Some(wall_delta) = wall_delta_secs {
            if wall_delta < 0.0 || wall_delta > gap_limit {
                log_info!("wall-clock jump of {wall_delta:.0}s detected, resetting timers");
                reset_requested = true;
            }
        }

        self.daily.roll_over_if_needed(wall_now.date_naive());

        if self
            .fusion
            .poll_timeout(now, Duration::from_secs_f64(self.config.probe_timeout_seconds))
        {
            log_warn!("vision probe timed out, falling back to input-derived presence");
        }

        for event in events {
            match event {
                EngineEvent::Vision(snapshot) => self.fusion.accept(now, snapshot),
                EngineEvent::Command(command) => {
                    if self.apply_command(now, command) {
                        reset_requested = true;
                    }
                }
            }
        }

        if reset_requested {
            return self.reset_tick(now, wall_now);
        }

        let horizon = Duration::from_secs_f64(self.config.activity_window_minutes() * 60.0);
        let metrics = self
            .buffer
            .aggregate(now, horizon, self.config.baseline_activity());

        let reading = self.fusion.evaluate(now);
        let last_activity_at = match (self.buffer.last_activity_at(), reading.present_hint_at) {
            (Some(input), Some(vision)) => Some(input.max(vision)),
            (input, vision) => input.or(vision),
        };

        let machine_tick = self.machine.tick(
            now,
            last_activity_at,
            reading.authoritative_absence,
            self.config.break_reset_minutes,
            self.config.prolonged_seated_minutes,
        );

        self.daily
            .observe_tick(machine_tick.state, delta_secs, machine_tick.seated_minutes);
        if let Some(minutes) = machine_tick.closed_session_minutes {
            self.daily.record_session(minutes);
        }
        if let Some(transition) = machine_tick.transition {
            log_info!("state {:?} -> {:?}", transition.from, transition.to);
            if transition.from == EngineState::ProlongedSeated
                && transition.to == EngineState::ShortBreak
            {
                self.daily.record_break();
            }
        }

        let score_value = score(
            metrics.normalized_activity,
            machine_tick.seated_minutes,
            self.config.prolonged_seated_minutes,
            reading.posture_score,
        );

        let mut suppression = self.suppression.snapshot(now, wall_now);
        // A snooze only makes sense against the reminder it silenced; once
        // the prolonged episode ends it must not linger.
        if suppression.snooze_active && machine_tick.state != EngineState::ProlongedSeated {
            self.suppression.cancel_snooze();
            suppression.snooze_active = false;
            suppression.snooze_remaining_minutes = 0.0;
        }

        let decision = self.gate.evaluate(
            now,
            machine_tick.state,
            &suppression,
            self.config.notification_cooldown_minutes,
            self.config.notifications_enabled,
        );
        let reminder = decision.fire.then(|| self.reminders.pick());

        let request_probe = self.fusion.should_request_probe(
            now,
            ProbeContext {
                state: machine_tick.state,
                seated_minutes: machine_tick.seated_minutes,
                break_minutes: machine_tick.break_minutes,
            },
            self.config.prolonged_seated_minutes,
            self.config.break_reset_minutes,
        );

        let snapshot = self.build_snapshot(
            score_value,
            machine_tick.state,
            SnapshotMetrics {
                activity_sum: metrics.activity_sum,
                normalized_activity: metrics.normalized_activity,
                seated_minutes: machine_tick.seated_minutes,
                break_minutes: machine_tick.break_minutes,
                presence_confidence: reading.presence_confidence,
                posture_score: reading.posture_score.unwrap_or(1.0),
                posture_state: reading.posture_state,
            },
            suppression,
            decision.next_reminder_minutes,
            wall_now,
        );

        TickOutput {
            snapshot,
            reminder,
            request_probe,
        }
    }

    /// Returns true when the command requires a timer reset.
    fn apply_command(&mut self, now: Instant, command: Command) -> bool {
        match command {
            Command::Snooze { minutes } => {
                self.suppression.activate_snooze(now, minutes);
                false
            }
            Command::CancelSnooze => {
                self.suppression.cancel_snooze();
                false
            }
            Command::FlowMode { minutes } => {
                self.suppression.activate_flow(now, minutes);
                false
            }
            Command::CancelFlowMode => {
                self.suppression.cancel_flow();
                false
            }
            Command::RefreshSeatedTimer => {
                log_info!("manual seated-timer refresh");
                true
            }
            Command::UpdateConfig(config) => {
                self.apply_config(config);
                false
            }
            Command::ClockDiscontinuity => true,
        }
    }

    /// Adopt a new configuration, or keep the last-known-good one when the
    /// update is invalid.
    fn apply_config(&mut self, config: EngineConfig) {
        match config.validate().and_then(|_| config.parsed_quiet_hours()) {
            Ok(quiet_windows) => {
                self.suppression.set_quiet_windows(quiet_windows);
                self.fusion.reconfigure(
                    config.vision_enabled,
                    Duration::from_secs_f64(config.vision_capture_interval_seconds),
                    Duration::from_secs_f64(config.probe_cooldown_seconds),
                    Duration::from_secs_f64(config.ambiguous_silence_seconds),
                    config.vision_presence_threshold,
                );
                self.config = config;
                log_info!("engine configuration updated");
            }
            Err(err) => {
                log_warn!("rejecting config update, keeping previous values: {err}");
            }
        }
    }

    /// Timer-reset path shared by sleep gaps, clock anomalies, and the
    /// manual refresh command. Nothing is accumulated and no reminder can
    /// fire on this tick.
    fn reset_tick(&mut self, now: Instant, wall_now: DateTime<Local>) -> TickOutput {
        self.machine.reset(now);
        self.buffer.clear();
        self.fusion.reset();
        self.gate.reset();

        let suppression = self.suppression.snapshot(now, wall_now);
        let snapshot = self.build_snapshot(
            1.0,
            EngineState::ShortBreak,
            SnapshotMetrics {
                activity_sum: 0.0,
                normalized_activity: 0.0,
                seated_minutes: 0.0,
                break_minutes: 0.0,
                presence_confidence: 0.0,
                posture_score: 1.0,
                posture_state: PostureState::Untracked,
            },
            suppression,
            None,
            wall_now,
        );

        TickOutput {
            snapshot,
            reminder: None,
            request_probe: false,
        }
    }

    fn build_snapshot(
        &self,
        score: f64,
        state: EngineState,
        metrics: SnapshotMetrics,
        suppression: SuppressionSnapshot,
        next_reminder_minutes: Option<f64>,
        wall_now: DateTime<Local>,
    ) -> EngineSnapshot {
        EngineSnapshot {
            score,
            state,
            metrics,
            daily: self.daily.stats().clone(),
            suppression,
            next_reminder_minutes,
            updated_at: wall_now.with_timezone(&Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::PresenceSnapshot;

    const TICK: Duration = Duration::from_secs(2);

    struct Harness {
        core: EngineCore,
        buffer: Arc<SignalBuffer>,
        now: Instant,
        wall: DateTime<Local>,
    }

    impl Harness {
        fn new(config: EngineConfig) -> Self {
            let buffer = Arc::new(SignalBuffer::new(config.max_buffered_events));
            let wall = Local::now();
            let core = EngineCore::new(config, Arc::clone(&buffer), wall).expect("valid config");
            Self {
                core,
                buffer,
                now: Instant::now(),
                wall,
            }
        }

        fn type_key(&mut self) {
            self.buffer.record(self.now, 5.0);
        }

        fn tick(&mut self) -> TickOutput {
            let out = self.core.tick(self.now, self.wall, Vec::new());
            self.now += TICK;
            self.wall += chrono::Duration::from_std(TICK).unwrap();
            out
        }

        fn tick_with(&mut self, events: Vec<EngineEvent>) -> TickOutput {
            let out = self.core.tick(self.now, self.wall, events);
            self.now += TICK;
            self.wall += chrono::Duration::from_std(TICK).unwrap();
            out
        }

        /// Advance in engine ticks for `minutes`, typing every tick when
        /// `typing` is set. Returns the last output.
        fn run_minutes(&mut self, minutes: f64, typing: bool) -> TickOutput {
            let ticks = ((minutes * 60.0) / TICK.as_secs_f64()).round() as u64;
            let mut last = None;
            for _ in 0..ticks {
                if typing {
                    self.type_key();
                }
                last = Some(self.tick());
            }
            last.expect("at least one tick")
        }

        /// Jump both clocks without ticking, simulating a sleep gap.
        fn jump(&mut self, gap: Duration) {
            self.now += gap;
            self.wall += chrono::Duration::from_std(gap).unwrap();
        }
    }

    fn quick_config() -> EngineConfig {
        EngineConfig {
            break_reset_minutes: 3.0,
            short_break_minutes: 3.0,
            prolonged_seated_minutes: 10.0,
            notification_cooldown_minutes: 5.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn typing_keeps_the_engine_active() {
        let mut h = Harness::new(quick_config());
        h.type_key();
        let out = h.tick();
        assert_eq!(out.snapshot.state, EngineState::Active);
        assert!(out.snapshot.score > 0.0);
        assert!(out.snapshot.metrics.activity_sum > 0.0);
    }

    #[test]
    fn silence_reaches_short_break_never_prolonged() {
        let mut h = Harness::new(quick_config());
        h.type_key();
        h.tick();

        let mut states = Vec::new();
        for _ in 0..400 {
            let out = h.tick();
            states.push(out.snapshot.state);
        }
        assert!(states.contains(&EngineState::ShortBreak));
        assert!(!states.contains(&EngineState::ProlongedSeated));
    }

    #[test]
    fn sustained_typing_reaches_prolonged_and_fires_once_per_cooldown() {
        let mut h = Harness::new(quick_config());
        let out = h.run_minutes(10.1, true);
        assert_eq!(out.snapshot.state, EngineState::ProlongedSeated);

        // Keep sitting for the cooldown span and count reminders.
        let mut fired = 0;
        for _ in 0..150 {
            h.type_key();
            if h.tick().reminder.is_some() {
                fired += 1;
            }
        }
        // 150 ticks = 5 minutes = exactly one more cooldown window.
        assert_eq!(fired, 1);
    }

    #[test]
    fn authoritative_absence_resets_despite_recent_input() {
        let mut h = Harness::new(quick_config());
        let out = h.run_minutes(5.0, true);
        assert_eq!(out.snapshot.state, EngineState::Active);
        assert!(out.snapshot.metrics.seated_minutes >= 4.0);

        h.type_key();
        let out = h.tick_with(vec![EngineEvent::Vision(PresenceSnapshot::absent(0.9))]);
        assert_eq!(out.snapshot.state, EngineState::ShortBreak);
        assert_eq!(out.snapshot.metrics.seated_minutes, 0.0);
    }

    #[test]
    fn low_confidence_absence_does_not_reset() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(5.0, true);

        h.type_key();
        let out = h.tick_with(vec![EngineEvent::Vision(PresenceSnapshot::absent(0.2))]);
        assert_eq!(out.snapshot.state, EngineState::Active);
        assert!(out.snapshot.metrics.seated_minutes >= 4.0);
    }

    #[test]
    fn disabled_vision_keeps_presence_input_derived() {
        let mut h = Harness::new(EngineConfig {
            vision_enabled: false,
            ..quick_config()
        });
        h.run_minutes(5.0, true);

        h.type_key();
        let out = h.tick_with(vec![EngineEvent::Vision(PresenceSnapshot::absent(0.9))]);
        assert_eq!(out.snapshot.state, EngineState::Active);
        assert!(out.snapshot.metrics.seated_minutes >= 4.0);
    }

    #[test]
    fn confident_presence_extends_sitting_without_input() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(1.0, true);

        // Silent but visibly present: a fresh confident snapshot arrives
        // every tick, standing in for a continuous vision stream.
        let mut out = None;
        for _ in 0..120 {
            let snap =
                PresenceSnapshot::present(0.9, PostureState::Upright, 0.8);
            out = Some(h.tick_with(vec![EngineEvent::Vision(snap)]));
        }
        let out = out.unwrap();
        // Four silent minutes exceed break_reset, yet the user never left.
        assert_ne!(out.snapshot.state, EngineState::ShortBreak);
        assert!(out.snapshot.metrics.seated_minutes >= 4.0);
    }

    #[test]
    fn sleep_gap_resets_timers_and_suppresses_reminders() {
        let mut h = Harness::new(quick_config());
        let out = h.run_minutes(10.1, true);
        assert_eq!(out.snapshot.state, EngineState::ProlongedSeated);

        h.jump(Duration::from_secs(3600));
        let out = h.tick();
        assert_eq!(out.snapshot.state, EngineState::ShortBreak);
        assert_eq!(out.snapshot.metrics.seated_minutes, 0.0);
        assert!(out.reminder.is_none());
    }

    #[test]
    fn suspend_gap_is_detected_on_the_wall_clock_alone() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(8.0, true);

        // Across a suspend the monotonic clock stalls: only the wall clock
        // has moved by the next tick.
        h.wall += chrono::Duration::hours(1);
        let out = h.tick();
        assert_eq!(out.snapshot.state, EngineState::ShortBreak);
        assert_eq!(out.snapshot.metrics.seated_minutes, 0.0);
        assert!(out.reminder.is_none());
    }

    #[test]
    fn backward_wall_jump_is_treated_as_a_discontinuity() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(8.0, true);

        h.wall -= chrono::Duration::hours(1);
        let out = h.tick();
        assert_eq!(out.snapshot.state, EngineState::ShortBreak);
        assert_eq!(out.snapshot.metrics.seated_minutes, 0.0);
    }

    #[test]
    fn manual_refresh_behaves_like_a_break() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(8.0, true);

        let out = h.tick_with(vec![EngineEvent::Command(Command::RefreshSeatedTimer)]);
        assert_eq!(out.snapshot.state, EngineState::ShortBreak);
        assert_eq!(out.snapshot.metrics.seated_minutes, 0.0);

        // Typing again re-enters ACTIVE with a fresh seated timer.
        h.type_key();
        let out = h.tick();
        assert_eq!(out.snapshot.state, EngineState::Active);
        assert!(out.snapshot.metrics.seated_minutes < 1.0);
    }

    #[test]
    fn snooze_holds_reminders_then_releases() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(10.1, true);

        // Snooze for longer than the cooldown remainder, so only the snooze
        // is holding reminders back by the end.
        h.type_key();
        let out = h.tick_with(vec![EngineEvent::Command(Command::Snooze { minutes: 6.0 })]);
        assert!(out.reminder.is_none());
        assert!(out.snapshot.suppression.snooze_active);

        // Reminders stay silent for the whole snooze.
        let mut fired = 0;
        for _ in 0..179 {
            h.type_key();
            if h.tick().reminder.is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 0);

        // First tick past expiry fires again (still prolonged).
        h.type_key();
        let out = h.tick();
        assert!(out.reminder.is_some());
    }

    #[test]
    fn snooze_cancels_when_prolonged_ends() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(10.1, true);
        h.tick_with(vec![EngineEvent::Command(Command::Snooze { minutes: 60.0 })]);

        // Walk away long enough to end the episode.
        h.run_minutes(4.0, false);
        let out = h.tick();
        assert_ne!(out.snapshot.state, EngineState::ProlongedSeated);
        assert!(!out.snapshot.suppression.snooze_active);
    }

    #[test]
    fn flow_mode_suppresses_but_reports_remaining() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(10.1, true);

        h.type_key();
        let out = h.tick_with(vec![EngineEvent::Command(Command::FlowMode { minutes: 30.0 })]);
        assert!(out.reminder.is_none());
        assert!(out.snapshot.suppression.flow_mode_active);
        assert!(out.snapshot.suppression.flow_mode_remaining_minutes > 29.0);
    }

    #[test]
    fn probe_requested_near_prolonged_threshold_only_once() {
        let mut h = Harness::new(quick_config());
        // 10-minute threshold, 95% = 9.5 minutes.
        let mut requests = 0;
        let ticks = (10.0_f64 * 60.0 / TICK.as_secs_f64()) as u64;
        for _ in 0..ticks {
            h.type_key();
            if h.tick().request_probe {
                requests += 1;
            }
        }
        assert_eq!(requests, 1);
    }

    #[test]
    fn prolonged_break_increments_daily_count_active_break_does_not() {
        let mut h = Harness::new(quick_config());

        // Short sit, then walk away: no break counted.
        h.run_minutes(5.0, true);
        h.run_minutes(4.0, false);
        let out = h.tick();
        assert_eq!(out.snapshot.daily.break_count, 0);

        // Prolonged sit, then walk away: one break.
        h.run_minutes(10.2, true);
        h.run_minutes(4.0, false);
        let out = h.tick();
        assert_eq!(out.snapshot.daily.break_count, 1);
        assert!(out.snapshot.daily.prolonged_minutes > 0.0);
        assert!(out.snapshot.daily.longest_seated_minutes >= 10.0);
    }

    #[test]
    fn daily_stats_roll_over_at_midnight() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(10.2, true);
        assert!(h.tick().snapshot.daily.prolonged_minutes > 0.0);
        // End the sitting episode before midnight so the first tick of the
        // new day has nothing fresh to accumulate.
        h.run_minutes(4.0, false);

        // Next tick lands on a different local date.
        h.wall += chrono::Duration::days(1);
        let expected_date = h.wall.date_naive();
        let out = h.tick();
        assert_eq!(out.snapshot.daily.prolonged_minutes, 0.0);
        assert_eq!(out.snapshot.daily.break_count, 0);
        assert_eq!(out.snapshot.daily.longest_seated_minutes, 0.0);
        assert_eq!(out.snapshot.daily.date, expected_date);
    }

    #[test]
    fn invalid_config_update_keeps_previous_values() {
        let mut h = Harness::new(quick_config());
        let bad = EngineConfig {
            prolonged_seated_minutes: -1.0,
            ..quick_config()
        };
        h.tick_with(vec![EngineEvent::Command(Command::UpdateConfig(bad))]);
        assert_eq!(h.core.config().prolonged_seated_minutes, 10.0);

        let good = EngineConfig {
            prolonged_seated_minutes: 20.0,
            ..quick_config()
        };
        h.tick_with(vec![EngineEvent::Command(Command::UpdateConfig(good))]);
        assert_eq!(h.core.config().prolonged_seated_minutes, 20.0);
    }

    #[test]
    fn clock_discontinuity_command_forces_reset() {
        let mut h = Harness::new(quick_config());
        h.run_minutes(8.0, true);

        let out = h.tick_with(vec![EngineEvent::Command(Command::ClockDiscontinuity)]);
        assert_eq!(out.snapshot.state, EngineState::ShortBreak);
        assert_eq!(out.snapshot.metrics.seated_minutes, 0.0);
    }
}
