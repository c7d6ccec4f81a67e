//! Shared test fixtures for cell_core and downstream crates.
//!
//! Configs use the built-in chemistry table, a 1 Hz tick and the strict
//! chemistry policy so unknown keys fail loudly in tests.

use crate::update::capacity_wh;
use crate::{
    estimate_soc, Cell, CellId, Chemistry, ChemistryPolicy, ChemistryTable, Constants,
    HealthStatus, HistoryLimits, OperatingMode, SimConfig, SimulationState, Variant,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn free_running_config(cell_count: usize) -> SimConfig {
    SimConfig {
        variant: Variant::FreeRunning,
        cell_count,
        chemistries: Vec::new(),
        chemistry_policy: ChemistryPolicy::Strict,
        noise_level: 0.5,
        tick_rate_hz: 1.0,
        history: HistoryLimits::default(),
        constants: Constants::default(),
        chemistry_table: ChemistryTable::default(),
    }
}

/// Task-driven config; all cells LFP unless the caller overrides `chemistries`.
pub fn task_driven_config(cell_count: usize) -> SimConfig {
    SimConfig {
        variant: Variant::TaskDriven,
        noise_level: 0.0,
        ..free_running_config(cell_count)
    }
}

/// Seed 42, populated to `config.cell_count`, stopped.
pub fn base_state(config: &SimConfig) -> SimulationState {
    let mut state = SimulationState::new(42, config);
    let mut rng = make_rng();
    state
        .store
        .resize(config.cell_count, config, &mut rng)
        .expect("fixture cell count within max_cells");
    state
}

/// An LFP cell with soc and capacity derived from the given values, full
/// health and no mode.
pub fn lfp_cell(id: &str, voltage: f64, current: f64, temperature: f64) -> Cell {
    let table = ChemistryTable::default();
    Cell {
        id: CellId(id.to_string()),
        chemistry: Chemistry::Lfp,
        voltage,
        current,
        temperature,
        soc: estimate_soc(voltage, Chemistry::Lfp, &table),
        health: 100.0,
        capacity: capacity_wh(voltage, current),
        status: HealthStatus::Excellent,
        mode: OperatingMode::Idle,
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
