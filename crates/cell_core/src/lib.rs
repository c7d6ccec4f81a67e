//! `cell_core`: deterministic battery-cell simulation tick.
//!
//! No IO, no clock. All randomness via the passed-in Rng.

mod chemistry;
mod engine;
mod error;
pub mod export;
mod health;
mod history;
pub mod metrics;
mod sequencer;
mod status;
mod store;
mod types;
mod update;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use chemistry::{Chemistry, ChemistryPolicy, ChemistryProfile, ChemistryTable};
pub use engine::tick;
pub use error::CoreError;
pub use export::{export_cells, CellExportRecord, SnapshotFileWriter};
pub use health::{
    current_penalty, estimate_soc, health_before_noise, score_health, score_health_with_noise,
    soc_penalty, temperature_penalty, voltage_penalty, HEALTH_NOISE_AMPLITUDE,
};
pub use history::{AggregateSnapshot, BoundedHistory, CellSample, History, HistoryLimits};
pub use metrics::{
    cell_statistics, compute_fleet_metrics, CellStatistics, FleetMetrics, SeriesStats,
};
pub use sequencer::{ActiveOperation, SequencerPhase, StepOutcome, Task, TaskKind, TaskSequencer};
pub use status::{classify, HealthStatus, StatusReport, Suggestion};
pub use store::{spawn_cell, CellStore, ResizeOutcome};
pub use types::*;
pub use update::{apply_free_running_tick, apply_task_tick, refresh_derived};

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(test)]
mod tests;
