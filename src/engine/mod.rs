mod controller;
mod core;
mod daily;
mod fusion;
mod gate;
mod inbox;
mod score;
mod state;

pub use self::controller::EngineController;
pub use self::core::{EngineCore, EngineSnapshot, SnapshotMetrics, TickOutput};
pub use self::daily::{DailyAggregator, DailyStats};
pub use self::fusion::{FusionReading, PresenceFusion, ProbeContext};
pub use self::gate::{GateDecision, NotificationGate, SuppressionSnapshot, SuppressionState};
pub use self::inbox::{Command, EngineEvent, Inbox};
pub use self::score::score;
pub use self::state::{EngineState, MachineTick, SeatedSession, StateMachine, Transition};
