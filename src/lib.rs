//! Seated-activity engine: fuses low-rate behavioral signals (keyboard/mouse
//! activity plus optional camera-derived presence) into a single
//! ACTIVE / SHORT_BREAK / PROLONGED_SEATED state, tracks daily sitting
//! stats, and decides when a break reminder should fire.
//!
//! The host process owns one [`engine::EngineController`]; input hooks,
//! vision probes, and user commands all feed it, and consumers read the
//! published [`engine::EngineSnapshot`] stream.

mod utils;

pub mod clock;
pub mod config;
pub mod engine;
pub mod reminders;
pub mod signals;
pub mod vision;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{Command, EngineController, EngineSnapshot, EngineState};
pub use reminders::Reminder;
pub use signals::{PostureState, PresenceSnapshot};
pub use vision::{NullVisionSource, SimulatedVisionSource, VisionProbeSource};
