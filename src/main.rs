//! Headless runner: wires the engine to the system clock and a simulated
//! vision source, turns stdin lines into activity, and logs snapshots and
//! reminders. The real product surfaces (status bar, notifier, dashboard)
//! live outside this crate and consume the same channels.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use upclock::{Command, EngineConfig, EngineController, SimulatedVisionSource, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = EngineConfig::default();
    let (controller, mut reminders) = EngineController::spawn(
        config,
        Arc::new(SystemClock),
        Arc::new(SimulatedVisionSource::default()),
    )?;
    let controller = Arc::new(controller);

    info!("engine running; type to simulate activity, or: snooze | flow | refresh | quit");

    // stdin stands in for the OS input hook: every line counts as activity,
    // a few keywords map to user commands.
    let stdin_controller = Arc::clone(&controller);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "snooze" => stdin_controller.command(Command::Snooze { minutes: 15.0 }),
                "flow" => stdin_controller.command(Command::FlowMode { minutes: 25.0 }),
                "refresh" => stdin_controller.command(Command::RefreshSeatedTimer),
                "quit" => break,
                _ => stdin_controller.record_input(1.0 + line.len() as f64),
            }
        }
    });

    let reminder_task = tokio::spawn(async move {
        while let Some(reminder) = reminders.recv().await {
            info!("reminder: {} — {}", reminder.title, reminder.body);
        }
    });

    let snapshots = controller.subscribe();
    let mut report = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = report.tick() => {
                let snapshot = snapshots.borrow().clone();
                info!(
                    "state={:?} score={:.2} seated={:.1}min break={:.1}min prolonged_today={:.1}min",
                    snapshot.state,
                    snapshot.score,
                    snapshot.metrics.seated_minutes,
                    snapshot.metrics.break_minutes,
                    snapshot.daily.prolonged_minutes,
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    let final_snapshot = serde_json::to_string(&controller.latest_snapshot())?;
    info!("final snapshot: {final_snapshot}");

    controller.shutdown().await?;
    reminder_task.abort();
    Ok(())
}
