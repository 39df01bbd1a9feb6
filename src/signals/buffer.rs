use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::types::InputEvent;

/// Aggregate view over the in-window input events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetrics {
    pub activity_sum: f64,
    pub normalized_activity: f64,
}

/// Fixed-horizon ring of input events. `record` is safe to call from any
/// producer thread concurrently with `aggregate`; both take the inner lock,
/// so sums are exact at call time.
pub struct SignalBuffer {
    inner: Mutex<Inner>,
    max_events: usize,
}

struct Inner {
    events: VecDeque<InputEvent>,
    /// Survives eviction so the break timer still knows the last activity
    /// even after the event itself aged out of the horizon.
    last_activity_at: Option<Instant>,
}

impl SignalBuffer {
    pub fn new(max_events: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(max_events.min(1024)),
                last_activity_at: None,
            }),
            max_events,
        }
    }

    pub fn record(&self, at: Instant, weight: f64) {
        let mut inner = self.inner.lock().unwrap();
        if weight > 0.0 {
            inner.last_activity_at = Some(match inner.last_activity_at {
                Some(prev) => prev.max(at),
                None => at,
            });
        }
        inner.events.push_back(InputEvent { at, weight });
        while inner.events.len() > self.max_events {
            inner.events.pop_front();
        }
    }

    /// Evicts events older than `now - horizon`, then sums the remaining
    /// weights. Negative weights are ignored; an empty window yields zeros.
    pub fn aggregate(&self, now: Instant, horizon: Duration, baseline: f64) -> ActivityMetrics {
        let mut inner = self.inner.lock().unwrap();
        while let Some(front) = inner.events.front() {
            if now.saturating_duration_since(front.at) > horizon {
                inner.events.pop_front();
            } else {
                break;
            }
        }

        let activity_sum: f64 = inner
            .events
            .iter()
            .map(|event| event.weight.max(0.0))
            .sum();
        let normalized_activity = if activity_sum > 0.0 && baseline > 0.0 {
            (activity_sum / baseline).min(1.0)
        } else {
            0.0
        };

        ActivityMetrics {
            activity_sum,
            normalized_activity,
        }
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.inner.lock().unwrap().last_activity_at
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.events.clear();
        inner.last_activity_at = None;
    }
}
