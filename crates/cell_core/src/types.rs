//! Type definitions for `cell_core`.
//!
//! Cell records, simulation state, commands, events and configuration.

use serde::{Deserialize, Serialize};

use crate::{
    CellStore, Chemistry, ChemistryPolicy, ChemistryTable, HealthStatus, History, HistoryLimits,
    TaskKind, TaskSequencer,
};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub String);
string_id!(CellId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);
string_id!(EventId);

const CELL_ID_PREFIX: &str = "cell_";

impl CellId {
    pub fn from_number(number: u64) -> Self {
        Self(format!("{CELL_ID_PREFIX}{number:04}"))
    }

    /// Counter value of an id minted by [`CellId::from_number`].
    pub fn number(&self) -> Option<u64> {
        self.0.strip_prefix(CELL_ID_PREFIX)?.parse().ok()
    }
}

/// Creation order: minted ids compare by counter value, so `cell_10000`
/// follows `cell_9999`. Other strings sort before them, lexically.
impl Ord for CellId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.number(), &self.0).cmp(&(other.number(), &other.0))
    }
}

impl PartialOrd for CellId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Which simulation core drives the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Bounded random walk scaled by the noise level.
    FreeRunning,
    /// Drift dictated by the active task in the sequencer.
    TaskDriven,
}

/// Operational mode of a cell. Separate axis from [`HealthStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    #[default]
    Idle,
    Charging,
    Discharging,
}

// ---------------------------------------------------------------------------
// Cell types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub chemistry: Chemistry,
    /// Volts.
    pub voltage: f64,
    /// Amperes; positive charges, negative discharges.
    pub current: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent, 0–100.
    pub soc: f64,
    /// Percent, 0–100.
    pub health: f64,
    /// Watt-hours, always `round(|voltage × current|, 2)`.
    pub capacity: f64,
    pub status: HealthStatus,
    pub mode: OperatingMode,
}

impl Cell {
    pub fn reading(&self) -> Reading {
        Reading {
            voltage: self.voltage,
            current: self.current,
            temperature: self.temperature,
            soc: self.soc,
        }
    }
}

/// The electrical/thermal inputs of the health scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub soc: f64,
}

/// A direct user edit of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellParams {
    pub chemistry: Chemistry,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SimulationState {
    pub meta: MetaState,
    pub store: CellStore,
    pub sequencer: TaskSequencer,
    pub history: History,
    pub running: bool,
    pub counters: Counters,
}

impl SimulationState {
    /// Empty store, empty queue, stopped.
    pub fn new(seed: u64, config: &SimConfig) -> Self {
        Self {
            meta: MetaState {
                tick: 0,
                seed,
                elapsed_s: 0.0,
                schema_version: 1,
                variant: config.variant,
            },
            store: CellStore::new(),
            sequencer: TaskSequencer::new(),
            history: History::new(config.history),
            running: false,
            counters: Counters { next_event_id: 0 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub seed: u64,
    /// Simulation seconds since the state was built.
    pub elapsed_s: f64,
    pub schema_version: u32,
    pub variant: Variant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Stop,
    /// Empty both history buffers and stop.
    ResetHistory,
    SetCellCount {
        count: usize,
    },
    ConfigureCell {
        cell_id: CellId,
        params: CellParams,
    },
    EnqueueTask {
        kind: TaskKind,
        duration_s: f64,
    },
    ClearSequence,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    SimulationStarted,
    SimulationStopped,
    HistoryReset,
    CellAdded {
        cell_id: CellId,
        chemistry: Chemistry,
    },
    CellRemoved {
        cell_id: CellId,
    },
    CellConfigured {
        cell_id: CellId,
    },
    TaskEnqueued {
        index: usize,
        task: String,
    },
    TaskStarted {
        index: usize,
        task: String,
    },
    TaskCompleted {
        index: usize,
        task: String,
    },
    SequenceCompleted {
        tasks: usize,
    },
    SequenceCleared,
    CommandRejected {
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Closed interval used for clamp envelopes and input bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Ranges accepted from user input before a command is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputBounds {
    pub voltage: Bounds,
    pub current: Bounds,
    pub temperature: Bounds,
    /// Magnitude of a task's configured current.
    pub task_current: Bounds,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            voltage: Bounds::new(0.0, 5.0),
            current: Bounds::new(-15.0, 15.0),
            temperature: Bounds::new(-10.0, 70.0),
            task_current: Bounds::new(0.1, 5.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    /// Operating envelope for every cell, °C.
    pub temperature_envelope: Bounds,
    /// Free-running voltage clamp; generic across chemistries.
    pub free_run_voltage: Bounds,
    pub free_run_current: Bounds,
    /// Above this |current| a free-running cell heats up.
    pub heating_current_threshold_a: f64,
    /// °C added per ampere above the heating threshold.
    pub heating_c_per_a: f64,
    /// Extra voltage sag per ampere while discharging.
    pub discharge_sag_v_per_a: f64,
    pub task_voltage_step_v: f64,
    pub charge_soc_step_pct: f64,
    pub discharge_soc_step_pct: f64,
    pub task_temperature_jitter_c: f64,
    /// Task-driven temperature clamp, applied only while current flows.
    pub task_temperature: Bounds,
    /// Duration reported for the implicit idle operation of an empty queue.
    pub default_idle_duration_s: f64,
    pub max_cells: usize,
    pub input: InputBounds,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            temperature_envelope: Bounds::new(-10.0, 70.0),
            free_run_voltage: Bounds::new(0.1, 5.0),
            free_run_current: Bounds::new(-15.0, 15.0),
            heating_current_threshold_a: 3.0,
            heating_c_per_a: 0.1,
            discharge_sag_v_per_a: 0.002,
            task_voltage_step_v: 0.01,
            charge_soc_step_pct: 0.5,
            discharge_soc_step_pct: 0.3,
            task_temperature_jitter_c: 0.5,
            task_temperature: Bounds::new(20.0, 50.0),
            default_idle_duration_s: 30.0,
            max_cells: 16,
            input: InputBounds::default(),
        }
    }
}

/// Everything a tick reads besides state and randomness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub variant: Variant,
    pub cell_count: usize,
    /// Chemistry of the cell created at each position; missing positions use
    /// the variant's default.
    #[serde(default)]
    pub chemistries: Vec<Chemistry>,
    #[serde(default)]
    pub chemistry_policy: ChemistryPolicy,
    /// Random-walk amplitude for the free-running variant.
    pub noise_level: f64,
    pub tick_rate_hz: f64,
    #[serde(default)]
    pub history: HistoryLimits,
    #[serde(default)]
    pub constants: Constants,
    #[serde(default)]
    pub chemistry_table: ChemistryTable,
}

impl SimConfig {
    /// Simulation seconds covered by one tick.
    pub fn tick_interval_s(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }
}
