//! The sample configs shipped in `config/` must load and produce a runnable state.

use cell_core::test_fixtures::make_rng;
use cell_core::{Chemistry, Variant};
use cell_world::{build_initial_state, load_config};
use std::path::PathBuf;

fn config_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

#[test]
fn test_free_running_sample_loads() {
    let config = load_config(&config_path("free_running.json")).unwrap();
    assert_eq!(config.variant, Variant::FreeRunning);
    assert_eq!(config.cell_count, 4);
    let mut rng = make_rng();
    let state = build_initial_state(&config, 1, &mut rng).unwrap();
    let chemistries: Vec<Chemistry> = state.store.iter().map(|c| c.chemistry).collect();
    assert_eq!(
        chemistries,
        vec![Chemistry::Nmc, Chemistry::Lfp, Chemistry::Nmc, Chemistry::Lfp]
    );
}

#[test]
fn test_task_driven_sample_loads() {
    let config = load_config(&config_path("task_driven.json")).unwrap();
    assert_eq!(config.variant, Variant::TaskDriven);
    assert_eq!(config.chemistries.len(), 8);
    assert_eq!(config.chemistries[7], Chemistry::LeadAcid);

    let mut rng = make_rng();
    let state = build_initial_state(&config, 1, &mut rng).unwrap();
    let lead_acid = state.store.iter().last().unwrap();
    let nominal = config.chemistry_table.profile(Chemistry::LeadAcid).nominal_voltage;
    assert!((lead_acid.voltage - nominal).abs() < 1e-9);
}

#[test]
fn test_written_config_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.json");
    std::fs::write(
        &path,
        r#"{ "variant": "TaskDriven", "cell_count": 1, "tick_rate_hz": 4.0 }"#,
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    assert!((config.tick_interval_s() - 0.25).abs() < 1e-12);
}
