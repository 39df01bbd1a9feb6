use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::reminders::Reminder;
use crate::signals::{PresenceSnapshot, SignalBuffer};
use crate::vision::VisionProbeSource;

use super::core::{EngineCore, EngineSnapshot};
use super::inbox::{Command, EngineEvent, Inbox};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const REMINDER_CHANNEL_CAPACITY: usize = 16;

/// Runs the engine: spawns the tick loop, accepts producer pushes and user
/// commands, publishes snapshots on a watch channel and reminders on an
/// mpsc channel. All state transitions happen inside the loop under one
/// lock, so producers never observe a half-applied tick.
pub struct EngineController {
    buffer: Arc<SignalBuffer>,
    inbox: Arc<Inbox>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
    snapshot_rx: watch::Receiver<EngineSnapshot>,
}

impl EngineController {
    /// Validate the config, build the engine, and start ticking.
    /// Returns the controller plus the reminder event stream.
    pub fn spawn(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        probe_source: Arc<dyn VisionProbeSource>,
    ) -> Result<(Self, mpsc::Receiver<Reminder>)> {
        let buffer = Arc::new(SignalBuffer::new(config.max_buffered_events));
        let inbox = Arc::new(Inbox::new(config.inbox_capacity));
        let tick_period = Duration::from_secs_f64(config.tick_interval_seconds);

        let core = EngineCore::new(config, Arc::clone(&buffer), clock.wall_now())
            .context("engine configuration rejected")?;
        let (snapshot_tx, snapshot_rx) = watch::channel(core.initial_snapshot(clock.wall_now()));
        let (reminder_tx, reminder_rx) = mpsc::channel(REMINDER_CHANNEL_CAPACITY);

        let core = Arc::new(Mutex::new(core));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(tick_loop(
            Arc::clone(&core),
            Arc::clone(&inbox),
            Arc::clone(&clock),
            probe_source,
            tick_period,
            snapshot_tx,
            reminder_tx,
            cancel.clone(),
        ));

        Ok((
            Self {
                buffer,
                inbox,
                clock,
                cancel,
                ticker: Mutex::new(Some(handle)),
                snapshot_rx,
            },
            reminder_rx,
        ))
    }

    /// Producer-side input hook: record one activity sample.
    pub fn record_input(&self, weight: f64) {
        self.buffer.record(self.clock.now(), weight);
    }

    /// Deliver an unsolicited presence snapshot (continuous external source).
    pub fn push_snapshot(&self, snapshot: PresenceSnapshot) {
        self.inbox.push(EngineEvent::Vision(snapshot));
    }

    /// Queue a user command; applied at the next tick boundary.
    pub fn command(&self, command: Command) {
        self.inbox.push(EngineEvent::Command(command));
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn latest_snapshot(&self) -> EngineSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.await.context("engine tick loop failed to join")?;
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn tick_loop(
    core: Arc<Mutex<EngineCore>>,
    inbox: Arc<Inbox>,
    clock: Arc<dyn Clock>,
    probe_source: Arc<dyn VisionProbeSource>,
    tick_period: Duration,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    reminder_tx: mpsc::Sender<Reminder>,
    cancel: CancellationToken,
) {
    let mut interval = time::interval(tick_period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outstanding: Option<oneshot::Receiver<PresenceSnapshot>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock.now();
                let wall_now = clock.wall_now();
                let mut events = inbox.drain();

                // Poll the outstanding probe without ever blocking the tick.
                if let Some(rx) = outstanding.as_mut() {
                    match rx.try_recv() {
                        Ok(snapshot) => {
                            events.push(EngineEvent::Vision(snapshot));
                            outstanding = None;
                        }
                        Err(oneshot::error::TryRecvError::Empty) => {}
                        Err(oneshot::error::TryRecvError::Closed) => {
                            outstanding = None;
                            core.lock().await.cancel_probe(now);
                        }
                    }
                }

                let (output, probe_live) = {
                    let mut guard = core.lock().await;
                    let output = guard.tick(now, wall_now, events);
                    (output, guard.probe_outstanding())
                };

                if output.request_probe {
                    outstanding = Some(probe_source.request_probe());
                } else if !probe_live {
                    // Slot timed out inside the engine; a late result on the
                    // old channel must be discarded.
                    outstanding = None;
                }

                if snapshot_tx.send(output.snapshot).is_err() {
                    log_info!("all snapshot subscribers dropped");
                }
                if let Some(reminder) = output.reminder {
                    if reminder_tx.try_send(reminder).is_err() {
                        log_warn!("reminder channel full or closed, dropping reminder");
                    }
                }
            }
            _ = cancel.cancelled() => {
                log_info!("engine tick loop shutting down");
                break;
            }
        }
    }
}
