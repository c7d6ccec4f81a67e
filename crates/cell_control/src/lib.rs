//! Command sources and input validation in front of `cell_core::tick`.

use cell_core::{
    Bounds, CellParams, Chemistry, Command, Constants, CoreError, InputBounds, SequencerPhase,
    SimConfig, SimulationState, TaskKind, Variant,
};
use serde::{Deserialize, Serialize};

pub trait CommandSource {
    fn generate_commands(&mut self, state: &SimulationState, config: &SimConfig) -> Vec<Command>;
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

fn check_range(parameter: &'static str, value: f64, bounds: Bounds) -> Result<(), CoreError> {
    if bounds.contains(value) {
        Ok(())
    } else {
        Err(CoreError::OutOfRangeParameter {
            parameter,
            value,
            min: bounds.min,
            max: bounds.max,
        })
    }
}

/// Rejects a user edit whose values fall outside the configured input bounds.
pub fn validate_cell_params(params: &CellParams, bounds: &InputBounds) -> Result<(), CoreError> {
    check_range("voltage", params.voltage, bounds.voltage)?;
    check_range("current", params.current, bounds.current)?;
    check_range("temperature", params.temperature, bounds.temperature)
}

/// Duration first, then the task's current magnitude and voltage setpoint.
pub fn validate_task(
    kind: &TaskKind,
    duration_s: f64,
    bounds: &InputBounds,
) -> Result<(), CoreError> {
    if !duration_s.is_finite() || duration_s <= 0.0 {
        return Err(CoreError::InvalidTaskDuration(duration_s));
    }
    match *kind {
        TaskKind::ConstantCurrentConstantVoltage {
            current_a,
            cv_voltage_v: voltage,
        }
        | TaskKind::ConstantCurrentDischarge {
            current_a,
            cutoff_voltage_v: voltage,
        } => {
            check_range("task current", current_a.abs(), bounds.task_current)?;
            check_range("task voltage", voltage, bounds.voltage)
        }
        TaskKind::Idle => Ok(()),
    }
}

/// Boundary check for any command built from user input.
pub fn validate_command(command: &Command, constants: &Constants) -> Result<(), CoreError> {
    match command {
        Command::ConfigureCell { params, .. } => validate_cell_params(params, &constants.input),
        Command::EnqueueTask { kind, duration_s } => {
            validate_task(kind, *duration_s, &constants.input)
        }
        Command::SetCellCount { count } if *count > constants.max_cells => {
            Err(CoreError::TooManyCells {
                requested: *count,
                max: constants.max_cells,
            })
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Scripted scenarios
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub at_tick: u64,
    pub command: Command,
}

/// Replays a fixed list of commands at their scheduled ticks.
#[derive(Debug, Clone, Default)]
pub struct ScriptedController {
    schedule: Vec<ScheduledCommand>,
}

impl ScriptedController {
    /// Commands at the same tick keep their listed order.
    pub fn new(mut schedule: Vec<ScheduledCommand>) -> Self {
        schedule.sort_by_key(|entry| entry.at_tick);
        Self { schedule }
    }

    /// Parse a JSON array of scheduled commands and validate each one.
    pub fn from_json(json: &str, constants: &Constants) -> Result<Self, CoreError> {
        let schedule: Vec<ScheduledCommand> = serde_json::from_str(json)?;
        for entry in &schedule {
            validate_command(&entry.command, constants)?;
        }
        Ok(Self::new(schedule))
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }
}

impl CommandSource for ScriptedController {
    fn generate_commands(&mut self, state: &SimulationState, _config: &SimConfig) -> Vec<Command> {
        let tick = state.meta.tick;
        self.schedule
            .iter()
            .filter(|entry| entry.at_tick == tick)
            .map(|entry| entry.command.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Charge-cycle autopilot
// ---------------------------------------------------------------------------

/// Shape of one charge / rest / discharge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub charge_current_a: f64,
    pub charge_duration_s: f64,
    pub rest_duration_s: f64,
    pub discharge_current_a: f64,
    pub discharge_duration_s: f64,
}

impl Default for CyclePlan {
    fn default() -> Self {
        Self {
            charge_current_a: 1.0,
            charge_duration_s: 60.0,
            rest_duration_s: 10.0,
            discharge_current_a: 2.0,
            discharge_duration_s: 60.0,
        }
    }
}

/// Keeps a task-driven run cycling:
/// 1. Empty queue: enqueue charge, rest and discharge, then start.
/// 2. Completed sequence: restart it, up to `max_cycles` runs.
///
/// Does nothing in the free-running variant or while a sequence is paused.
#[derive(Debug, Clone)]
pub struct ChargeCycleController {
    plan: CyclePlan,
    max_cycles: Option<u32>,
    cycles_started: u32,
}

impl ChargeCycleController {
    pub fn new(plan: CyclePlan, max_cycles: Option<u32>) -> Self {
        Self {
            plan,
            max_cycles,
            cycles_started: 0,
        }
    }

    pub fn cycles_started(&self) -> u32 {
        self.cycles_started
    }

    fn may_start_cycle(&self) -> bool {
        self.max_cycles.is_none_or(|max| self.cycles_started < max)
    }

    fn cycle_tasks(&self, state: &SimulationState, config: &SimConfig) -> Vec<Command> {
        // Setpoints follow the first cell's chemistry.
        let chemistry = state
            .store
            .iter()
            .next()
            .map_or(Chemistry::FALLBACK, |cell| cell.chemistry);
        let profile = config.chemistry_table.profile(chemistry);
        vec![
            Command::EnqueueTask {
                kind: TaskKind::ConstantCurrentConstantVoltage {
                    current_a: self.plan.charge_current_a,
                    cv_voltage_v: profile.max_voltage,
                },
                duration_s: self.plan.charge_duration_s,
            },
            Command::EnqueueTask {
                kind: TaskKind::Idle,
                duration_s: self.plan.rest_duration_s,
            },
            Command::EnqueueTask {
                kind: TaskKind::ConstantCurrentDischarge {
                    current_a: self.plan.discharge_current_a,
                    cutoff_voltage_v: profile.min_voltage,
                },
                duration_s: self.plan.discharge_duration_s,
            },
        ]
    }
}

impl Default for ChargeCycleController {
    fn default() -> Self {
        Self::new(CyclePlan::default(), None)
    }
}

impl CommandSource for ChargeCycleController {
    fn generate_commands(&mut self, state: &SimulationState, config: &SimConfig) -> Vec<Command> {
        if config.variant != Variant::TaskDriven || state.running || !self.may_start_cycle() {
            return Vec::new();
        }

        let mut commands = Vec::new();
        if state.sequencer.is_empty() {
            commands.extend(self.cycle_tasks(state, config));
        } else if state.sequencer.phase(state.meta.elapsed_s) != SequencerPhase::Completed {
            return commands;
        }
        commands.push(Command::Start);
        self.cycles_started += 1;
        commands
    }
}
