use thiserror::Error;

use crate::CellId;

/// Failures surfaced by the simulation core.
///
/// Normal edge values (zero cells, extreme but finite parameters) never land
/// here; they are clamped. These variants cover inputs the core refuses.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown chemistry '{0}'")]
    InvalidChemistry(String),

    #[error("{parameter} = {value} is outside [{min}, {max}]")]
    OutOfRangeParameter {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("task duration must be a positive number of seconds, got {0}")]
    InvalidTaskDuration(f64),

    /// Aggregate requested over an empty store.
    #[error("no cells in store")]
    EmptyStoreMetric,

    #[error("unknown cell '{0}'")]
    UnknownCell(CellId),

    #[error("requested {requested} cells, limit is {max}")]
    TooManyCells { requested: usize, max: usize },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
