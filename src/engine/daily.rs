use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::state::EngineState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

/// Per-calendar-day rollup. No persistence: yesterday's stats are discarded
/// at rollover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub prolonged_minutes: f64,
    pub break_count: u32,
    pub longest_seated_minutes: f64,
}

impl DailyStats {
    fn zeroed(date: NaiveDate) -> Self {
        Self {
            date,
            prolonged_minutes: 0.0,
            break_count: 0,
            longest_seated_minutes: 0.0,
        }
    }
}

pub struct DailyAggregator {
    stats: DailyStats,
}

impl DailyAggregator {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            stats: DailyStats::zeroed(date),
        }
    }

    /// First observation on a new local date discards the old stats and
    /// starts from zero.
    pub fn roll_over_if_needed(&mut self, today: NaiveDate) {
        if today != self.stats.date {
            log_info!(
                "daily stats rollover {} -> {} ({} breaks, {:.1} prolonged min)",
                self.stats.date,
                today,
                self.stats.break_count,
                self.stats.prolonged_minutes
            );
            self.stats = DailyStats::zeroed(today);
        }
    }

    /// Integrate one tick. Prolonged minutes are time-weighted: only the
    /// elapsed tick delta spent in PROLONGED_SEATED counts. The longest
    /// session tracks the running seated timer, so pre-prolonged active
    /// time is included.
    pub fn observe_tick(&mut self, state: EngineState, delta_secs: f64, seated_minutes: f64) {
        if state == EngineState::ProlongedSeated {
            self.stats.prolonged_minutes += delta_secs.max(0.0) / 60.0;
        }
        if seated_minutes > self.stats.longest_seated_minutes {
            self.stats.longest_seated_minutes = seated_minutes;
        }
    }

    /// A closed seated session is a candidate for the day's longest stretch.
    pub fn record_session(&mut self, minutes: f64) {
        if minutes > self.stats.longest_seated_minutes {
            self.stats.longest_seated_minutes = minutes;
        }
    }

    /// A break only counts when it ends a prolonged stretch.
    pub fn record_break(&mut self) {
        self.stats.break_count += 1;
    }

    pub fn stats(&self) -> &DailyStats {
        &self.stats
    }
}
