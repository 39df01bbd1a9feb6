use std::time::Duration;

use rand::Rng;
use tokio::sync::oneshot;

use crate::signals::{PostureState, PresenceSnapshot};

/// External camera/pose subsystem, consumed as an abstract one-shot probe.
/// The engine never awaits the receiver; it polls it once per tick and times
/// the slot out if nothing ever arrives.
pub trait VisionProbeSource: Send + Sync + 'static {
    fn request_probe(&self) -> oneshot::Receiver<PresenceSnapshot>;
}

/// Stand-in when vision is disabled or the hardware is unavailable. Every
/// probe fails immediately, leaving presence input-derived.
pub struct NullVisionSource;

impl VisionProbeSource for NullVisionSource {
    fn request_probe(&self) -> oneshot::Receiver<PresenceSnapshot> {
        let (_tx, rx) = oneshot::channel();
        rx
    }
}

/// Synthetic probe source for demos and tests: resolves after a short delay
/// with a randomized (mostly present, upright) snapshot.
pub struct SimulatedVisionSource {
    pub presence_probability: f64,
    pub latency: Duration,
}

impl Default for SimulatedVisionSource {
    fn default() -> Self {
        Self {
            presence_probability: 0.9,
            latency: Duration::from_millis(300),
        }
    }
}

impl VisionProbeSource for SimulatedVisionSource {
    fn request_probe(&self) -> oneshot::Receiver<PresenceSnapshot> {
        let (tx, rx) = oneshot::channel();
        let presence_probability = self.presence_probability.clamp(0.0, 1.0);
        let latency = self.latency;

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let snapshot = {
                let mut rng = rand::thread_rng();
                if rng.gen_bool(presence_probability) {
                    PresenceSnapshot::present(
                        rng.gen_range(0.7..1.0),
                        PostureState::Upright,
                        rng.gen_range(0.6..1.0),
                    )
                } else {
                    PresenceSnapshot::absent(rng.gen_range(0.7..1.0))
                }
            };
            let _ = tx.send(snapshot);
        });

        rx
    }
}
