//! Parameter store: the single owner of every live cell.

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;

use crate::update::{refresh_derived, round_to};
use crate::{
    Cell, CellId, CellParams, Chemistry, CoreError, HealthStatus, OperatingMode, SimConfig,
    Variant,
};

/// Cells keyed by id. Ids come from a monotonic counter and are never reused.
#[derive(Debug, Clone, Serialize)]
pub struct CellStore {
    cells: BTreeMap<CellId, Cell>,
    next_number: u64,
}

impl Default for CellStore {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
            next_number: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub added: Vec<(CellId, Chemistry)>,
    pub removed: Vec<CellId>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn get_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    /// Cells in creation order (see the `Ord` impl on [`CellId`]).
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &CellId> {
        self.cells.keys()
    }

    /// Grow or shrink to `count` cells. Growth fills positions from the
    /// configured chemistry list; shrinking removes the newest cells first.
    pub fn resize(
        &mut self,
        count: usize,
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> Result<ResizeOutcome, CoreError> {
        let max = config.constants.max_cells;
        if count > max {
            return Err(CoreError::TooManyCells {
                requested: count,
                max,
            });
        }

        let mut outcome = ResizeOutcome::default();
        while self.cells.len() < count {
            let id = CellId::from_number(self.next_number);
            self.next_number += 1;
            let cell = spawn_cell(id.clone(), self.cells.len(), config, rng);
            outcome.added.push((id.clone(), cell.chemistry));
            self.cells.insert(id, cell);
        }
        while self.cells.len() > count {
            if let Some((id, _)) = self.cells.pop_last() {
                outcome.removed.push(id);
            }
        }
        Ok(outcome)
    }

    /// Apply a direct user edit and recompute the derived fields.
    ///
    /// Values are expected to be validated upstream; they are still clamped
    /// to the configured input envelope here.
    pub fn configure(
        &mut self,
        id: &CellId,
        params: CellParams,
        config: &SimConfig,
        rng: &mut impl Rng,
    ) -> Result<(), CoreError> {
        let cell = self
            .cells
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownCell(id.clone()))?;
        let input = &config.constants.input;
        cell.chemistry = params.chemistry;
        cell.voltage = input.voltage.clamp(params.voltage);
        cell.current = input.current.clamp(params.current);
        cell.temperature = config
            .constants
            .temperature_envelope
            .clamp(input.temperature.clamp(params.temperature));
        refresh_derived(cell, &config.chemistry_table, rng);
        Ok(())
    }
}

/// Fresh cell for slot `position`, initialised the way each variant does.
pub fn spawn_cell(id: CellId, position: usize, config: &SimConfig, rng: &mut impl Rng) -> Cell {
    let configured = config.chemistries.get(position).copied();
    match config.variant {
        Variant::FreeRunning => {
            let chemistry = configured.unwrap_or_else(|| {
                if rng.gen_bool(0.5) {
                    Chemistry::Nmc
                } else {
                    Chemistry::Lfp
                }
            });
            let mut cell = Cell {
                id,
                chemistry,
                voltage: rng.gen_range(3.0..=4.0),
                current: rng.gen_range(-2.0..=2.0),
                temperature: rng.gen_range(20.0..=35.0),
                soc: 0.0,
                health: rng.gen_range(60.0..=100.0),
                capacity: 0.0,
                status: HealthStatus::Good,
                mode: OperatingMode::Idle,
            };
            refresh_derived(&mut cell, &config.chemistry_table, rng);
            cell
        }
        Variant::TaskDriven => {
            let chemistry = configured.unwrap_or(Chemistry::Lfp);
            let voltage = config.chemistry_table.profile(chemistry).nominal_voltage;
            let temperature = round_to(rng.gen_range(25.0..=40.0), 1);
            let soc = f64::from(rng.gen_range(20_u32..=90));
            let health = f64::from(rng.gen_range(85_u32..=100));
            Cell {
                id,
                chemistry,
                voltage,
                current: 0.0,
                temperature,
                soc,
                health,
                capacity: 0.0,
                status: HealthStatus::from_health(health),
                mode: OperatingMode::Idle,
            }
        }
    }
}
