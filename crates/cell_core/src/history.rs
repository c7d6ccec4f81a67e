//! Bounded trend buffers for aggregate and per-cell samples.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{Cell, CellId, FleetMetrics, OperatingMode};

/// Append-only ring of immutable entries. Pushing past the capacity evicts
/// the oldest entries in the same call.
#[derive(Debug, Clone, Serialize)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryLimits {
    pub aggregate: usize,
    /// Shared across all cells, not per cell.
    pub cell_samples: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            aggregate: 100,
            cell_samples: 500,
        }
    }
}

/// Fleet-wide averages at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub tick: u64,
    pub elapsed_s: f64,
    pub cell_count: usize,
    pub avg_voltage: f64,
    pub total_voltage: f64,
    pub total_current: f64,
    pub avg_temperature: f64,
    pub avg_soc: f64,
    pub avg_health: f64,
    pub total_capacity: f64,
}

impl AggregateSnapshot {
    pub fn from_metrics(tick: u64, elapsed_s: f64, metrics: &FleetMetrics) -> Self {
        Self {
            tick,
            elapsed_s,
            cell_count: metrics.cell_count,
            avg_voltage: metrics.avg_voltage,
            total_voltage: metrics.total_voltage,
            total_current: metrics.total_current,
            avg_temperature: metrics.avg_temperature,
            avg_soc: metrics.avg_soc,
            avg_health: metrics.avg_health,
            total_capacity: metrics.total_capacity,
        }
    }
}

/// One cell at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSample {
    pub tick: u64,
    pub elapsed_s: f64,
    pub cell_id: CellId,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub soc: f64,
    pub health: f64,
    pub capacity: f64,
    pub mode: OperatingMode,
    /// Label of the active task; empty in the free-running variant.
    pub task: String,
}

impl CellSample {
    pub fn from_cell(tick: u64, elapsed_s: f64, cell: &Cell, task: &str) -> Self {
        Self {
            tick,
            elapsed_s,
            cell_id: cell.id.clone(),
            voltage: cell.voltage,
            current: cell.current,
            temperature: cell.temperature,
            soc: cell.soc,
            health: cell.health,
            capacity: cell.capacity,
            mode: cell.mode,
            task: task.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct History {
    pub aggregate: BoundedHistory<AggregateSnapshot>,
    pub cells: BoundedHistory<CellSample>,
}

impl History {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            aggregate: BoundedHistory::new(limits.aggregate),
            cells: BoundedHistory::new(limits.cell_samples),
        }
    }

    pub fn clear(&mut self) {
        self.aggregate.clear();
        self.cells.clear();
    }

    /// Samples of one cell, oldest first.
    pub fn samples_for<'a>(&'a self, id: &'a CellId) -> impl Iterator<Item = &'a CellSample> {
        self.cells.iter().filter(move |sample| &sample.cell_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tick: u64) -> AggregateSnapshot {
        AggregateSnapshot {
            tick,
            elapsed_s: 0.0,
            cell_count: 1,
            avg_voltage: 3.7,
            total_voltage: 3.7,
            total_current: 0.0,
            avg_temperature: 25.0,
            avg_soc: 50.0,
            avg_health: 90.0,
            total_capacity: 0.0,
        }
    }

    #[test]
    fn eviction_keeps_most_recent_in_order() {
        let mut history = BoundedHistory::new(100);
        for tick in 0..150 {
            history.push(snapshot(tick));
        }
        assert_eq!(history.len(), 100);
        let ticks: Vec<u64> = history.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, (50..150).collect::<Vec<_>>());
        assert_eq!(history.latest().map(|s| s.tick), Some(149));
    }

    #[test]
    fn under_capacity_keeps_everything() {
        let mut history = BoundedHistory::new(5);
        for value in 0..3 {
            history.push(value);
        }
        assert_eq!(history.to_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn clear_empties_both_buffers() {
        let mut history = History::new(HistoryLimits::default());
        history.aggregate.push(snapshot(0));
        history.clear();
        assert!(history.aggregate.is_empty());
        assert!(history.cells.is_empty());
        assert_eq!(history.aggregate.capacity(), 100);
        assert_eq!(history.cells.capacity(), 500);
    }
}
