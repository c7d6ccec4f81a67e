use super::*;

#[test]
fn test_running_advances_time_and_records() {
    let config = free_running_config(2);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    tick(&mut state, &[Command::Start], &config, &mut rng);
    run_ticks(&mut state, &config, &mut rng, 9);

    assert_eq!(state.meta.tick, 10);
    assert!((state.meta.elapsed_s - 10.0).abs() < EPS);
    assert_eq!(state.history.aggregate.len(), 10);
    assert_eq!(state.history.cells.len(), 20);

    let latest = state.history.aggregate.latest().unwrap();
    let metrics = compute_fleet_metrics(state.store.iter()).unwrap();
    assert_eq!(latest.cell_count, 2);
    assert!((latest.avg_voltage - metrics.avg_voltage).abs() < EPS);
}

#[test]
fn test_cells_stay_in_envelopes_under_heavy_noise() {
    let mut config = free_running_config(8);
    config.noise_level = 5.0;
    let mut state = base_state(&config);
    let mut rng = make_rng();

    tick(&mut state, &[Command::Start], &config, &mut rng);
    for _ in 0..300 {
        tick(&mut state, &[], &config, &mut rng);
        for cell in state.store.iter() {
            assert!(config.constants.temperature_envelope.contains(cell.temperature));
            assert!(config.constants.free_run_voltage.contains(cell.voltage));
            assert!(config.constants.free_run_current.contains(cell.current));
            assert!((0.0..=100.0).contains(&cell.soc));
            assert!((0.0..=100.0).contains(&cell.health));
            assert_eq!(cell.status, HealthStatus::from_health(cell.health));
        }
    }
}

#[test]
fn test_empty_store_records_no_aggregate() {
    let config = free_running_config(0);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    tick(&mut state, &[Command::Start], &config, &mut rng);
    run_ticks(&mut state, &config, &mut rng, 3);

    assert!(state.running);
    assert!(state.history.aggregate.is_empty());
    assert!(state.history.cells.is_empty());
}

#[test]
fn test_cell_statistics_over_history() {
    let config = free_running_config(2);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    tick(&mut state, &[Command::Start], &config, &mut rng);
    run_ticks(&mut state, &config, &mut rng, 19);

    let stats = cell_statistics(state.history.cells.iter());
    assert_eq!(stats.len(), 2);
    for entry in &stats {
        assert_eq!(entry.voltage.count, 20);
        assert!(entry.voltage.min <= entry.voltage.mean);
        assert!(entry.voltage.mean <= entry.voltage.max);
        assert!(entry.soc.std_dev.is_some());
    }
    let samples: Vec<_> = state.history.samples_for(&stats[0].cell_id).collect();
    assert_eq!(samples.len(), 20);
}
