//! Per-cell tick updates for both simulation variants.

use rand::Rng;

use crate::{
    classify, estimate_soc, score_health, Cell, ChemistryTable, Constants, OperatingMode, TaskKind,
};

/// Voltage noise as a fraction of the noise level.
const VOLTAGE_NOISE_SCALE: f64 = 0.02;
/// Current noise as a fraction of the noise level.
const CURRENT_NOISE_SCALE: f64 = 0.5;

/// Uniform draw in `[-amplitude, amplitude]`; zero for a non-positive amplitude.
pub(crate) fn symmetric(rng: &mut impl Rng, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn capacity_wh(voltage: f64, current: f64) -> f64 {
    round_to((voltage * current).abs(), 2)
}

/// Recompute soc, capacity, health and status from the electrical state.
pub fn refresh_derived(cell: &mut Cell, table: &ChemistryTable, rng: &mut impl Rng) {
    cell.soc = estimate_soc(cell.voltage, cell.chemistry, table);
    cell.capacity = capacity_wh(cell.voltage, cell.current);
    cell.health = score_health(&cell.reading(), cell.chemistry, table, rng);
    cell.status = classify(
        cell.health,
        cell.temperature,
        cell.voltage,
        cell.soc,
        cell.chemistry,
        table,
    )
    .status;
}

/// Free-running random walk.
///
/// Draw order is temperature, voltage, current, then the health noise.
pub fn apply_free_running_tick(
    cell: &mut Cell,
    noise_level: f64,
    constants: &Constants,
    table: &ChemistryTable,
    rng: &mut impl Rng,
) {
    let mut temperature_drift = symmetric(rng, noise_level);
    if cell.current.abs() > constants.heating_current_threshold_a {
        temperature_drift += cell.current.abs() * constants.heating_c_per_a;
    }
    cell.temperature = constants
        .temperature_envelope
        .clamp(cell.temperature + temperature_drift);

    let mut voltage_drift = symmetric(rng, noise_level * VOLTAGE_NOISE_SCALE);
    if cell.current < 0.0 {
        voltage_drift -= cell.current.abs() * constants.discharge_sag_v_per_a;
    }
    cell.voltage = constants.free_run_voltage.clamp(cell.voltage + voltage_drift);

    let current_drift = symmetric(rng, noise_level * CURRENT_NOISE_SCALE);
    cell.current = constants.free_run_current.clamp(cell.current + current_drift);

    refresh_derived(cell, table, rng);
}

/// Task-driven step. Only capacity is recomputed; soc drifts by fixed steps.
pub fn apply_task_tick(
    cell: &mut Cell,
    operation: &TaskKind,
    constants: &Constants,
    table: &ChemistryTable,
    rng: &mut impl Rng,
) {
    let profile = table.profile(cell.chemistry);
    match *operation {
        TaskKind::ConstantCurrentConstantVoltage { current_a, .. } => {
            cell.current = current_a;
            cell.voltage = (cell.voltage + constants.task_voltage_step_v).min(profile.max_voltage);
            cell.soc = (cell.soc + constants.charge_soc_step_pct).min(100.0);
        }
        TaskKind::ConstantCurrentDischarge { current_a, .. } => {
            cell.current = -current_a.abs();
            cell.voltage = (cell.voltage - constants.task_voltage_step_v).max(profile.min_voltage);
            cell.soc = (cell.soc - constants.discharge_soc_step_pct).max(0.0);
        }
        TaskKind::Idle => {
            cell.current = 0.0;
        }
    }
    // Edits and chemistry changes can leave a cell outside its window.
    cell.voltage = profile.clamp_voltage(cell.voltage);
    cell.mode = operation.mode();

    if cell.current.abs() > 0.0 {
        let jitter = symmetric(rng, constants.task_temperature_jitter_c);
        cell.temperature = constants.task_temperature.clamp(cell.temperature + jitter);
    }
    cell.capacity = capacity_wh(cell.voltage, cell.current);
}
