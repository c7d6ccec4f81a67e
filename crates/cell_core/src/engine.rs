use rand::Rng;

use crate::sequencer::StepOutcome;
use crate::update::{apply_free_running_tick, apply_task_tick};
use crate::{
    compute_fleet_metrics, AggregateSnapshot, CellSample, Command, Event, EventEnvelope,
    SimConfig, SimulationState, Variant,
};

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. Apply commands in submission order.
/// 2. If running, update every cell for the configured variant.
/// 3. If still running, record aggregate and per-cell history.
/// 4. Advance simulation time (running ticks only) and the tick counter.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut SimulationState,
    commands: &[Command],
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    apply_commands(state, commands, config, rng, &mut events);

    if state.running {
        let task_label = match config.variant {
            Variant::FreeRunning => {
                step_free_running(state, config, rng);
                Some(String::new())
            }
            Variant::TaskDriven => step_task_driven(state, config, rng, &mut events),
        };
        if let Some(label) = task_label {
            record_history(state, &label);
            state.meta.elapsed_s += config.tick_interval_s();
        }
    }

    state.meta.tick += 1;
    events
}

fn apply_commands(
    state: &mut SimulationState,
    commands: &[Command],
    config: &SimConfig,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    for command in commands {
        apply_command(state, command, config, rng, events);
    }
}

fn apply_command(
    state: &mut SimulationState,
    command: &Command,
    config: &SimConfig,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    match command {
        Command::Start => {
            if !state.running {
                state.running = true;
                push(state, events, Event::SimulationStarted);
            }
            if config.variant == Variant::TaskDriven {
                let now = state.meta.elapsed_s;
                begin_next_task(state, now, events);
            }
        }
        Command::Stop => stop(state, events),
        Command::ResetHistory => {
            state.history.clear();
            stop(state, events);
            push(state, events, Event::HistoryReset);
        }
        Command::SetCellCount { count } => match state.store.resize(*count, config, rng) {
            Ok(outcome) => {
                for (cell_id, chemistry) in outcome.added {
                    push(state, events, Event::CellAdded { cell_id, chemistry });
                }
                for cell_id in outcome.removed {
                    push(state, events, Event::CellRemoved { cell_id });
                }
            }
            Err(err) => reject(state, &err, events),
        },
        Command::ConfigureCell { cell_id, params } => {
            match state.store.configure(cell_id, *params, config, rng) {
                Ok(()) => {
                    let cell_id = cell_id.clone();
                    push(state, events, Event::CellConfigured { cell_id });
                }
                Err(err) => reject(state, &err, events),
            }
        }
        Command::EnqueueTask { kind, duration_s } => {
            match state.sequencer.enqueue(kind.clone(), *duration_s) {
                Ok(index) => {
                    let task = task_description(state, index);
                    push(state, events, Event::TaskEnqueued { index, task });
                }
                Err(err) => reject(state, &err, events),
            }
        }
        Command::ClearSequence => {
            state.sequencer.clear();
            push(state, events, Event::SequenceCleared);
        }
    }
}

fn push(state: &mut SimulationState, events: &mut Vec<EventEnvelope>, event: Event) {
    events.push(crate::emit(&mut state.counters, state.meta.tick, event));
}

fn stop(state: &mut SimulationState, events: &mut Vec<EventEnvelope>) {
    if state.running {
        state.running = false;
        push(state, events, Event::SimulationStopped);
    }
}

fn reject(state: &mut SimulationState, err: &crate::CoreError, events: &mut Vec<EventEnvelope>) {
    let reason = err.to_string();
    push(state, events, Event::CommandRejected { reason });
}

fn begin_next_task(state: &mut SimulationState, now: f64, events: &mut Vec<EventEnvelope>) {
    if state.sequencer.begin(now) {
        let index = state.sequencer.step_index();
        let task = task_description(state, index);
        push(state, events, Event::TaskStarted { index, task });
    }
}

fn task_description(state: &SimulationState, index: usize) -> String {
    state
        .sequencer
        .tasks()
        .get(index)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn step_free_running(state: &mut SimulationState, config: &SimConfig, rng: &mut impl Rng) {
    for cell in state.store.iter_mut() {
        apply_free_running_tick(
            cell,
            config.noise_level,
            &config.constants,
            &config.chemistry_table,
            rng,
        );
    }
}

/// Advance the sequencer, then drive every cell with the active operation.
///
/// Returns the active task label, or `None` when the sequence finished this
/// tick and the simulation stopped without updating cells.
fn step_task_driven(
    state: &mut SimulationState,
    config: &SimConfig,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Option<String> {
    let now = state.meta.elapsed_s;

    // Tasks enqueued after Start begin on the next running tick.
    begin_next_task(state, now, events);

    match state.sequencer.advance(now) {
        Some(StepOutcome::Advanced { completed, next }) => {
            let task = task_description(state, completed);
            push(state, events, Event::TaskCompleted { index: completed, task });
            let task = task_description(state, next);
            push(state, events, Event::TaskStarted { index: next, task });
        }
        Some(StepOutcome::Finished { completed }) => {
            let task = task_description(state, completed);
            push(state, events, Event::TaskCompleted { index: completed, task });
            let tasks = state.sequencer.len();
            push(state, events, Event::SequenceCompleted { tasks });
            stop(state, events);
            return None;
        }
        None => {}
    }

    let operation = state
        .sequencer
        .active_operation(config.constants.default_idle_duration_s);
    for cell in state.store.iter_mut() {
        apply_task_tick(
            cell,
            &operation.kind,
            &config.constants,
            &config.chemistry_table,
            rng,
        );
    }
    Some(operation.kind.label().to_string())
}

fn record_history(state: &mut SimulationState, task_label: &str) {
    let tick = state.meta.tick;
    let elapsed_s = state.meta.elapsed_s;

    // An empty store has no aggregate; per-cell history has nothing to add either.
    if let Ok(metrics) = compute_fleet_metrics(state.store.iter()) {
        state
            .history
            .aggregate
            .push(AggregateSnapshot::from_metrics(tick, elapsed_s, &metrics));
    }
    for cell in state.store.iter() {
        state
            .history
            .cells
            .push(CellSample::from_cell(tick, elapsed_s, cell, task_label));
    }
}
