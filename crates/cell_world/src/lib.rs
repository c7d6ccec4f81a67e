//! Configuration loading and initial state construction shared between
//! cell_cli and cell_daemon.

use anyhow::{ensure, Context, Result};
use cell_core::{
    Bounds, Chemistry, ChemistryPolicy, ChemistryTable, Constants, HistoryLimits, SimConfig,
    SimulationState, Variant,
};
use rand::Rng;
use serde::Deserialize;
use std::path::Path;

/// On-disk shape of a config file. Chemistries are plain strings here and
/// resolved through the file's policy.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    variant: Variant,
    cell_count: usize,
    #[serde(default)]
    chemistries: Vec<String>,
    #[serde(default)]
    chemistry_policy: ChemistryPolicy,
    #[serde(default = "default_noise_level")]
    noise_level: f64,
    #[serde(default = "default_tick_rate_hz")]
    tick_rate_hz: f64,
    #[serde(default)]
    history: HistoryLimits,
    #[serde(default)]
    constants: Constants,
    #[serde(default)]
    chemistry_table: ChemistryTable,
}

fn default_noise_level() -> f64 {
    0.5
}

fn default_tick_rate_hz() -> f64 {
    1.0
}

/// Built-in configuration for a variant: four cells, default tables.
pub fn default_config(variant: Variant) -> SimConfig {
    SimConfig {
        variant,
        cell_count: 4,
        chemistries: Vec::new(),
        chemistry_policy: ChemistryPolicy::Fallback,
        noise_level: default_noise_level(),
        tick_rate_hz: default_tick_rate_hz(),
        history: HistoryLimits::default(),
        constants: Constants::default(),
        chemistry_table: ChemistryTable::default(),
    }
}

/// Rejects configurations the simulation cannot run with.
pub fn validate_config(config: &SimConfig) -> Result<()> {
    ensure!(
        config.tick_rate_hz.is_finite() && config.tick_rate_hz > 0.0,
        "tick_rate_hz must be positive, got {}",
        config.tick_rate_hz
    );
    ensure!(
        config.noise_level.is_finite() && config.noise_level >= 0.0,
        "noise_level must be non-negative, got {}",
        config.noise_level
    );
    ensure!(config.history.aggregate > 0, "history.aggregate must be at least 1");
    ensure!(
        config.history.cell_samples > 0,
        "history.cell_samples must be at least 1"
    );

    let c = &config.constants;
    ensure!(c.max_cells > 0, "constants.max_cells must be at least 1");
    ensure!(
        config.cell_count <= c.max_cells,
        "cell_count {} exceeds constants.max_cells {}",
        config.cell_count,
        c.max_cells
    );
    ensure!(
        c.default_idle_duration_s > 0.0,
        "constants.default_idle_duration_s must be positive"
    );
    let envelopes: [(&str, Bounds); 8] = [
        ("temperature_envelope", c.temperature_envelope),
        ("free_run_voltage", c.free_run_voltage),
        ("free_run_current", c.free_run_current),
        ("task_temperature", c.task_temperature),
        ("input.voltage", c.input.voltage),
        ("input.current", c.input.current),
        ("input.temperature", c.input.temperature),
        ("input.task_current", c.input.task_current),
    ];
    for (name, bounds) in envelopes {
        ensure!(
            bounds.min <= bounds.max,
            "constants.{name} is inverted: min {} > max {}",
            bounds.min,
            bounds.max
        );
    }

    ensure!(
        config.chemistry_table.contains(Chemistry::FALLBACK),
        "chemistry_table must define the {} fallback row",
        Chemistry::FALLBACK
    );
    for (chemistry, profile) in config.chemistry_table.iter() {
        ensure!(
            profile.min_voltage < profile.max_voltage,
            "chemistry_table.{chemistry}: min_voltage must be below max_voltage"
        );
    }
    Ok(())
}

/// Parse and validate a JSON config document.
pub fn parse_config(json: &str) -> Result<SimConfig> {
    let file: ConfigFile = serde_json::from_str(json).context("parsing config")?;
    let chemistries = file
        .chemistries
        .iter()
        .map(|key| Chemistry::resolve(key, file.chemistry_policy))
        .collect::<Result<Vec<_>, _>>()
        .context("resolving chemistries")?;
    let config = SimConfig {
        variant: file.variant,
        cell_count: file.cell_count,
        chemistries,
        chemistry_policy: file.chemistry_policy,
        noise_level: file.noise_level,
        tick_rate_hz: file.tick_rate_hz,
        history: file.history,
        constants: file.constants,
        chemistry_table: file.chemistry_table,
    };
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file: {}", path.display()))?;
    parse_config(&json).with_context(|| format!("loading config file: {}", path.display()))
}

/// Stopped state holding `config.cell_count` freshly initialised cells.
pub fn build_initial_state(
    config: &SimConfig,
    seed: u64,
    rng: &mut impl Rng,
) -> Result<SimulationState> {
    let mut state = SimulationState::new(seed, config);
    state
        .store
        .resize(config.cell_count, config, rng)
        .context("populating initial cells")?;
    Ok(state)
}
