use super::*;
use crate::test_fixtures::{base_state, free_running_config, make_rng, task_driven_config};

mod commands;
mod free_running;

// --- Shared test helpers ------------------------------------------------

const EPS: f64 = 1e-9;

fn run_ticks(
    state: &mut SimulationState,
    config: &SimConfig,
    rng: &mut impl rand::Rng,
    ticks: usize,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(tick(state, &[], config, rng));
    }
    events
}

fn kinds(events: &[EventEnvelope]) -> Vec<&Event> {
    events.iter().map(|e| &e.event).collect()
}

fn charge_task(current_a: f64) -> TaskKind {
    TaskKind::ConstantCurrentConstantVoltage {
        current_a,
        cv_voltage_v: 3.65,
    }
}

fn discharge_task(current_a: f64) -> TaskKind {
    TaskKind::ConstantCurrentDischarge {
        current_a,
        cutoff_voltage_v: 2.5,
    }
}
