use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by [`EngineConfig::validate`]. The engine never adopts an
/// invalid configuration: the host keeps the last-known-good values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("shortBreakMinutes ({short_break}) must be below prolongedSeatedMinutes ({prolonged})")]
    BreakExceedsProlonged { short_break: f64, prolonged: f64 },

    #[error("breakResetMinutes ({break_reset}) must be below prolongedSeatedMinutes ({prolonged})")]
    ResetExceedsProlonged { break_reset: f64, prolonged: f64 },

    #[error("visionPresenceThreshold must be within 0..=1 (got {0})")]
    ThresholdOutOfRange(f64),

    #[error("invalid quiet-hours window {0:?}, expected (\"HH:MM\", \"HH:MM\")")]
    InvalidQuietWindow(String),
}

/// A quiet-hours window in minutes since local midnight. `start > end` wraps
/// past midnight (e.g. 22:00-07:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    pub start_min: u16,
    pub end_min: u16,
}

/// Engine configuration with tunable thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Tick loop period. Everything downstream is evaluated at this cadence.
    pub tick_interval_seconds: f64,

    /// Maximum break length that still returns to ACTIVE on new input.
    pub short_break_minutes: f64,

    /// Silence long enough to reset the seated timer.
    pub break_reset_minutes: f64,

    /// Continuous seated time that counts as prolonged sitting.
    pub prolonged_seated_minutes: f64,

    pub notifications_enabled: bool,
    pub notification_cooldown_minutes: f64,

    /// Local-time windows ("HH:MM", "HH:MM") during which reminders never fire.
    pub quiet_hours: Vec<(String, String)>,

    pub vision_enabled: bool,
    pub vision_capture_interval_seconds: f64,
    pub vision_presence_threshold: f64,

    /// How long an outstanding probe may stay unresolved before it is dropped.
    pub probe_timeout_seconds: f64,
    /// Minimum spacing between probe activations after one resolved or expired.
    pub probe_cooldown_seconds: f64,
    /// Input silence that makes presence ambiguous enough to probe.
    pub ambiguous_silence_seconds: f64,

    /// Elapsed wall time above `sleep_gap_multiplier * tick_interval_seconds`
    /// between ticks is treated as a sleep/wake discontinuity.
    pub sleep_gap_multiplier: f64,

    /// Producer inbox capacity; oldest pending items are dropped on overflow.
    pub inbox_capacity: usize,
    /// Hard cap on buffered input events, independent of the time horizon.
    pub max_buffered_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 2.0,
            short_break_minutes: 3.0,
            break_reset_minutes: 3.0,
            prolonged_seated_minutes: 45.0,
            notifications_enabled: true,
            notification_cooldown_minutes: 30.0,
            quiet_hours: Vec::new(),
            vision_enabled: true,
            vision_capture_interval_seconds: 10.0,
            vision_presence_threshold: 0.6,
            probe_timeout_seconds: 90.0,
            probe_cooldown_seconds: 120.0,
            ambiguous_silence_seconds: 60.0,
            sleep_gap_multiplier: 10.0,
            inbox_capacity: 256,
            max_buffered_events: 4096,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("tickIntervalSeconds", self.tick_interval_seconds),
            ("shortBreakMinutes", self.short_break_minutes),
            ("breakResetMinutes", self.break_reset_minutes),
            ("prolongedSeatedMinutes", self.prolonged_seated_minutes),
            (
                "notificationCooldownMinutes",
                self.notification_cooldown_minutes,
            ),
            (
                "visionCaptureIntervalSeconds",
                self.vision_capture_interval_seconds,
            ),
            ("probeTimeoutSeconds", self.probe_timeout_seconds),
            ("probeCooldownSeconds", self.probe_cooldown_seconds),
            ("ambiguousSilenceSeconds", self.ambiguous_silence_seconds),
            ("sleepGapMultiplier", self.sleep_gap_multiplier),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        if self.short_break_minutes >= self.prolonged_seated_minutes {
            return Err(ConfigError::BreakExceedsProlonged {
                short_break: self.short_break_minutes,
                prolonged: self.prolonged_seated_minutes,
            });
        }

        if self.break_reset_minutes >= self.prolonged_seated_minutes {
            return Err(ConfigError::ResetExceedsProlonged {
                break_reset: self.break_reset_minutes,
                prolonged: self.prolonged_seated_minutes,
            });
        }

        if !(0.0..=1.0).contains(&self.vision_presence_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(
                self.vision_presence_threshold,
            ));
        }

        self.parsed_quiet_hours()?;

        Ok(())
    }

    /// Aggregation horizon for the signal buffer: bounded by the short-break
    /// threshold so stale activity cannot mask a break, capped at 5 minutes.
    pub fn activity_window_minutes(&self) -> f64 {
        self.short_break_minutes.min(5.0).max(1.0)
    }

    /// Reference activity sum mapping to a fully saturated window.
    pub fn baseline_activity(&self) -> f64 {
        (self.activity_window_minutes() * 60.0 / 6.0).max(20.0)
    }

    pub fn parsed_quiet_hours(&self) -> Result<Vec<QuietWindow>, ConfigError> {
        let mut windows = Vec::with_capacity(self.quiet_hours.len());
        for (start, end) in &self.quiet_hours {
            let window = QuietWindow {
                start_min: parse_hh_mm(start)
                    .ok_or_else(|| ConfigError::InvalidQuietWindow(format!("{start}-{end}")))?,
                end_min: parse_hh_mm(end)
                    .ok_or_else(|| ConfigError::InvalidQuietWindow(format!("{start}-{end}")))?,
            };
            windows.push(window);
        }
        Ok(windows)
    }
}

fn parse_hh_mm(value: &str) -> Option<u16> {
    let (hour, minute) = value.trim().split_once(':')?;
    let hour: u16 = hour.parse().ok()?;
    let minute: u16 = minute.parse().ok()?;
    if hour >= 24 || minute >= 60 {
        return None;
    }
    Some(hour * 60 + minute)
}
