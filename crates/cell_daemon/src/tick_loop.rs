use crate::state::{EventTx, SharedSim, SimState};
use cell_control::CommandSource;
use cell_core::{Event, EventEnvelope};
use std::time::Duration;

/// Fastest wall-clock pacing the loop accepts; 0 means unpaced.
pub const MAX_TICKS_PER_SEC: f64 = 1_000.0;

/// Rejects pacing rates that would give `tokio::time::interval` a zero or
/// non-finite period.
pub fn check_ticks_per_sec(ticks_per_sec: f64) -> anyhow::Result<f64> {
    anyhow::ensure!(
        ticks_per_sec.is_finite() && (0.0..=MAX_TICKS_PER_SEC).contains(&ticks_per_sec),
        "ticks per second must be within [0, {MAX_TICKS_PER_SEC}], got {ticks_per_sec}"
    );
    Ok(ticks_per_sec)
}

/// Run one tick: drain queued commands, add the autopilot's, advance the core.
pub fn step(sim: &mut SimState) -> Vec<EventEnvelope> {
    let mut commands = std::mem::take(&mut sim.pending);
    if let Some(autopilot) = sim.autopilot.as_mut() {
        commands.extend(autopilot.generate_commands(&sim.sim, &sim.config));
    }
    let events = cell_core::tick(&mut sim.sim, &commands, &sim.config, &mut sim.rng);
    for envelope in &events {
        match &envelope.event {
            Event::SimulationStarted => tracing::info!(tick = envelope.tick, "simulation started"),
            Event::SimulationStopped => tracing::info!(tick = envelope.tick, "simulation stopped"),
            Event::SequenceCompleted { tasks } => {
                tracing::info!(tick = envelope.tick, tasks, "task sequence completed");
            }
            Event::CommandRejected { reason } => {
                tracing::warn!(tick = envelope.tick, reason = %reason, "command rejected");
            }
            _ => {}
        }
    }
    events
}

pub async fn run_tick_loop(
    sim: SharedSim,
    event_tx: EventTx,
    ticks_per_sec: f64,
    max_ticks: Option<u64>,
) {
    let mut interval = if ticks_per_sec > 0.0 {
        let mut iv = tokio::time::interval(Duration::from_secs_f64(1.0 / ticks_per_sec));
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Some(iv)
    } else {
        None
    };

    loop {
        let (events, done) = {
            let mut guard = sim.lock();
            let events = step(&mut guard);
            let done = max_ticks.is_some_and(|max| guard.sim.meta.tick >= max);
            (events, done)
        };

        if !events.is_empty() {
            // No subscribers is fine; events are still in the core's history.
            let _ = event_tx.send(events);
        }

        if done {
            break;
        }

        if let Some(ref mut iv) = interval {
            iv.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
