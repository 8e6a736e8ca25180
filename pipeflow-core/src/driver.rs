//! Periodic Driver
//!
//! Runs the Update Pass (and optionally the Frame Render Pass) on a timer
//! until told to stop. The engine is shared behind a mutex that each tick
//! holds for the whole pass, so passes never overlap and collaborators can
//! edit the graph between ticks.

use std::future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::Engine;

/// Counters accumulated by [`drive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Update passes that completed.
    pub updates: u64,
    /// Frames that completed.
    pub frames: u64,
    /// Update passes that returned an error.
    pub failed_updates: u64,
    /// Frames that returned an error.
    pub failed_frames: u64,
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

/// Drive `engine` on the intervals from its config until `shutdown` turns
/// `true` or its sender is dropped.
///
/// Errors are already logged by the passes; here they are only counted.
pub async fn drive<G>(engine: Arc<Mutex<Engine<G>>>, mut shutdown: watch::Receiver<bool>) -> TickStats
where
    G: Send + 'static,
{
    let (update_period, frame_period) = {
        let engine = engine.lock();
        (engine.config().update_interval(), engine.config().frame_interval())
    };
    let mut updates = ticker(update_period);
    let mut frames = frame_period.map(ticker);
    let mut stats = TickStats::default();

    info!(?update_period, ?frame_period, "driver started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = updates.tick() => {
                let result = engine.lock().run_update();
                match result {
                    Ok(report) if !report.is_empty() => {
                        debug!(recomputed = report.recomputed.len(), "tick update");
                        stats.updates += 1;
                    }
                    Ok(_) => stats.updates += 1,
                    Err(_) => stats.failed_updates += 1,
                }
            }
            _ = next_tick(&mut frames) => {
                let result = engine.lock().render_frame();
                match result {
                    Ok(_) => stats.frames += 1,
                    Err(_) => stats.failed_frames += 1,
                }
            }
        }
    }
    info!(?stats, "driver stopped");
    stats
}
