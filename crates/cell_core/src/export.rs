//! Tabular export of the cell set and the history buffers.
//!
//! Records are plain serde structs; the same CSV and JSON helpers handle cell
//! exports, aggregate snapshots and per-cell samples.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::update::round_to;
use crate::{classify, AggregateSnapshot, CellStore, ChemistryTable, CoreError};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exported when a cell has no advisories.
const NO_SUGGESTIONS: &str = "None";

/// One row of the cell export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellExportRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Cell_ID")]
    pub cell_id: String,
    #[serde(rename = "Cell_Type")]
    pub chemistry: String,
    #[serde(rename = "Voltage_V")]
    pub voltage_v: f64,
    #[serde(rename = "Current_A")]
    pub current_a: f64,
    #[serde(rename = "Temperature_C")]
    pub temperature_c: f64,
    #[serde(rename = "SOC_Percent")]
    pub soc_pct: f64,
    #[serde(rename = "Health_Percent")]
    pub health_pct: f64,
    #[serde(rename = "Capacity_Wh")]
    pub capacity_wh: f64,
    #[serde(rename = "Status")]
    pub status: String,
    /// `"; "`-joined advisories, or `None`.
    #[serde(rename = "Suggestions")]
    pub suggestions: String,
}

/// Classify every cell and build its export row, stamped with `now`.
pub fn export_cells(
    store: &CellStore,
    table: &ChemistryTable,
    now: DateTime<Utc>,
) -> Vec<CellExportRecord> {
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    store
        .iter()
        .map(|cell| {
            let report = classify(
                cell.health,
                cell.temperature,
                cell.voltage,
                cell.soc,
                cell.chemistry,
                table,
            );
            let suggestions = if report.suggestions.is_empty() {
                NO_SUGGESTIONS.to_string()
            } else {
                report.messages().join("; ")
            };
            CellExportRecord {
                timestamp: timestamp.clone(),
                cell_id: cell.id.to_string(),
                chemistry: cell.chemistry.label().to_string(),
                voltage_v: round_to(cell.voltage, 3),
                current_a: round_to(cell.current, 3),
                temperature_c: round_to(cell.temperature, 1),
                soc_pct: round_to(cell.soc, 1),
                health_pct: round_to(cell.health, 1),
                capacity_wh: round_to(cell.capacity, 2),
                status: report.status.label().to_string(),
                suggestions,
            }
        })
        .collect()
}

pub fn write_csv<T: Serialize, W: Write>(writer: W, records: &[T]) -> Result<(), CoreError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn read_csv<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>, CoreError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize()
        .map(|row| row.map_err(CoreError::from))
        .collect()
}

/// Pretty-printed JSON array of records.
pub fn to_json<T: Serialize>(records: &[T]) -> Result<String, CoreError> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, CoreError> {
    Ok(serde_json::from_str(json)?)
}

pub fn write_csv_file<T: Serialize>(path: &Path, records: &[T]) -> Result<(), CoreError> {
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), records)
}

pub fn write_json_file<T: Serialize>(path: &Path, records: &[T]) -> Result<(), CoreError> {
    std::fs::write(path, to_json(records)?)?;
    Ok(())
}

/// Data rows per file before [`SnapshotFileWriter`] rotates.
const MAX_ROWS_PER_FILE: usize = 50_000;

/// Streams aggregate snapshots to `aggregate_000.csv`, `aggregate_001.csv`,
/// ... in a run directory, rotating every [`MAX_ROWS_PER_FILE`] rows.
pub struct SnapshotFileWriter {
    run_dir: PathBuf,
    file_index: u32,
    rows_in_current_file: usize,
    writer: csv::Writer<std::fs::File>,
}

impl SnapshotFileWriter {
    pub fn new(run_dir: PathBuf) -> Result<Self, CoreError> {
        let writer = open_snapshot_file(&run_dir, 0)?;
        Ok(Self {
            run_dir,
            file_index: 0,
            rows_in_current_file: 0,
            writer,
        })
    }

    pub fn write_row(&mut self, snapshot: &AggregateSnapshot) -> Result<(), CoreError> {
        if self.rows_in_current_file >= MAX_ROWS_PER_FILE {
            self.writer.flush()?;
            self.file_index += 1;
            self.writer = open_snapshot_file(&self.run_dir, self.file_index)?;
            self.rows_in_current_file = 0;
        }
        self.writer.serialize(snapshot)?;
        self.writer.flush()?;
        self.rows_in_current_file += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CoreError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn open_snapshot_file(run_dir: &Path, index: u32) -> Result<csv::Writer<std::fs::File>, CoreError> {
    let path = run_dir.join(format!("aggregate_{index:03}.csv"));
    Ok(csv::Writer::from_path(path)?)
}
