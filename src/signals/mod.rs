mod buffer;
mod types;

pub use buffer::{ActivityMetrics, SignalBuffer};
pub use types::{InputEvent, PostureState, PresenceSnapshot};
