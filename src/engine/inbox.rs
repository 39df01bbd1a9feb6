use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::EngineConfig;
use crate::signals::PresenceSnapshot;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// User-facing commands applied at the next tick boundary.
#[derive(Debug, Clone)]
pub enum Command {
    Snooze { minutes: f64 },
    CancelSnooze,
    FlowMode { minutes: f64 },
    CancelFlowMode,
    /// Behave as if a break just ended, without requiring one.
    RefreshSeatedTimer,
    /// Full replacement config; rejected (keeping the old one) if invalid.
    UpdateConfig(EngineConfig),
    /// Host-reported sleep/wake or clock jump.
    ClockDiscontinuity,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Vision(PresenceSnapshot),
    Command(Command),
}

/// Bounded, non-blocking producer inbox. Overflow drops the oldest pending
/// item so producers never stall; the tick loop drains it in one go.
pub struct Inbox {
    inner: Mutex<VecDeque<EngineEvent>>,
    capacity: usize,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, event: EngineEvent) {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            queue.pop_front();
            log_warn!("engine inbox full, dropping oldest pending event");
        }
        queue.push_back(event);
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        let mut queue = self.inner.lock().unwrap();
        queue.drain(..).collect()
    }
}
