//! Fleet aggregates and per-cell trend statistics.
//!
//! Read-only over the store and history; no state mutation, no IO.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Cell, CellId, CellSample, CoreError, HealthStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetMetrics {
    pub cell_count: usize,
    pub avg_voltage: f64,
    pub total_voltage: f64,
    pub total_current: f64,
    pub avg_temperature: f64,
    pub avg_soc: f64,
    pub avg_health: f64,
    pub total_capacity: f64,
    pub status_counts: BTreeMap<HealthStatus, usize>,
}

/// Aggregate over every cell. Zero cells is [`CoreError::EmptyStoreMetric`],
/// never a division by zero.
pub fn compute_fleet_metrics<'a>(
    cells: impl IntoIterator<Item = &'a Cell>,
) -> Result<FleetMetrics, CoreError> {
    let mut count = 0_usize;
    let mut total_voltage = 0.0;
    let mut total_current = 0.0;
    let mut temperature_sum = 0.0;
    let mut soc_sum = 0.0;
    let mut health_sum = 0.0;
    let mut total_capacity = 0.0;
    let mut status_counts = BTreeMap::new();

    for cell in cells {
        count += 1;
        total_voltage += cell.voltage;
        total_current += cell.current;
        temperature_sum += cell.temperature;
        soc_sum += cell.soc;
        health_sum += cell.health;
        total_capacity += cell.capacity;
        *status_counts.entry(cell.status).or_insert(0) += 1;
    }

    if count == 0 {
        return Err(CoreError::EmptyStoreMetric);
    }
    let n = count as f64;
    Ok(FleetMetrics {
        cell_count: count,
        avg_voltage: total_voltage / n,
        total_voltage,
        total_current,
        avg_temperature: temperature_sum / n,
        avg_soc: soc_sum / n,
        avg_health: health_sum / n,
        total_capacity,
        status_counts,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; `None` below two samples.
    pub std_dev: Option<f64>,
}

impl SeriesStats {
    /// `None` for an empty series.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = (values.len() >= 2).then(|| {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        });
        Some(Self {
            count: values.len(),
            mean,
            min,
            max,
            std_dev,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellStatistics {
    pub cell_id: CellId,
    pub voltage: SeriesStats,
    pub current: SeriesStats,
    pub temperature: SeriesStats,
    pub soc: SeriesStats,
}

/// Per-cell trend statistics, one entry per cell id present in `samples`,
/// ordered by id.
pub fn cell_statistics<'a>(
    samples: impl IntoIterator<Item = &'a CellSample>,
) -> Vec<CellStatistics> {
    #[derive(Default)]
    struct Series {
        voltage: Vec<f64>,
        current: Vec<f64>,
        temperature: Vec<f64>,
        soc: Vec<f64>,
    }

    let mut by_cell: BTreeMap<&CellId, Series> = BTreeMap::new();
    for sample in samples {
        let series = by_cell.entry(&sample.cell_id).or_default();
        series.voltage.push(sample.voltage);
        series.current.push(sample.current);
        series.temperature.push(sample.temperature);
        series.soc.push(sample.soc);
    }

    by_cell
        .into_iter()
        .filter_map(|(cell_id, series)| {
            Some(CellStatistics {
                cell_id: cell_id.clone(),
                voltage: SeriesStats::from_values(&series.voltage)?,
                current: SeriesStats::from_values(&series.current)?,
                temperature: SeriesStats::from_values(&series.temperature)?,
                soc: SeriesStats::from_values(&series.soc)?,
            })
        })
        .collect()
}
