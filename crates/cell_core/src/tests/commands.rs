use super::*;

#[test]
fn test_start_and_stop_emit_once() {
    let config = free_running_config(2);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let events = tick(&mut state, &[Command::Start, Command::Start], &config, &mut rng);
    assert_eq!(kinds(&events), vec![&Event::SimulationStarted]);
    assert!(state.running);

    let events = tick(&mut state, &[Command::Stop, Command::Stop], &config, &mut rng);
    assert_eq!(kinds(&events), vec![&Event::SimulationStopped]);
    assert!(!state.running);
}

#[test]
fn test_event_ids_are_monotonic() {
    let config = free_running_config(0);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let events = tick(
        &mut state,
        &[Command::SetCellCount { count: 3 }, Command::Start],
        &config,
        &mut rng,
    );
    let ids: Vec<&str> = events.iter().map(|e| e.id.0.as_str()).collect();
    assert_eq!(ids, vec!["evt_000000", "evt_000001", "evt_000002", "evt_000003"]);
    assert!(events.iter().all(|e| e.tick == 0));
}

#[test]
fn test_stopped_ticks_do_not_touch_cells_or_time() {
    let config = free_running_config(3);
    let mut state = base_state(&config);
    let before: Vec<Cell> = state.store.iter().cloned().collect();
    let mut rng = make_rng();

    run_ticks(&mut state, &config, &mut rng, 5);

    let after: Vec<Cell> = state.store.iter().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(state.meta.tick, 5);
    assert!(state.meta.elapsed_s.abs() < EPS);
    assert!(state.history.aggregate.is_empty());
}

#[test]
fn test_set_cell_count_emits_added_and_removed() {
    let config = free_running_config(0);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let events = tick(&mut state, &[Command::SetCellCount { count: 2 }], &config, &mut rng);
    assert!(matches!(
        kinds(&events)[..],
        [Event::CellAdded { .. }, Event::CellAdded { .. }]
    ));

    let events = tick(&mut state, &[Command::SetCellCount { count: 1 }], &config, &mut rng);
    assert_eq!(
        kinds(&events),
        vec![&Event::CellRemoved {
            cell_id: CellId::from_number(2)
        }]
    );
}

#[test]
fn test_removed_ids_are_never_reused() {
    let config = free_running_config(4);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    tick(&mut state, &[Command::SetCellCount { count: 1 }], &config, &mut rng);
    let events = tick(&mut state, &[Command::SetCellCount { count: 3 }], &config, &mut rng);

    let added: Vec<String> = events
        .iter()
        .filter_map(|e| match &e.event {
            Event::CellAdded { cell_id, .. } => Some(cell_id.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(added, vec!["cell_0005", "cell_0006"]);
}

#[test]
fn test_too_many_cells_is_rejected() {
    let config = free_running_config(2);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let events = tick(&mut state, &[Command::SetCellCount { count: 99 }], &config, &mut rng);
    assert!(matches!(
        kinds(&events)[..],
        [Event::CommandRejected { .. }]
    ));
    assert_eq!(state.store.len(), 2);
}

#[test]
fn test_configure_cell_recomputes_immediately() {
    let config = free_running_config(1);
    let mut state = base_state(&config);
    let mut rng = make_rng();
    let cell_id = CellId::from_number(1);

    let command = Command::ConfigureCell {
        cell_id: cell_id.clone(),
        params: CellParams {
            chemistry: Chemistry::NiMh,
            voltage: 1.2,
            current: 1.0,
            temperature: 25.0,
        },
    };
    let events = tick(&mut state, &[command], &config, &mut rng);

    assert_eq!(
        kinds(&events),
        vec![&Event::CellConfigured {
            cell_id: cell_id.clone()
        }]
    );
    let cell = state.store.get(&cell_id).unwrap();
    assert_eq!(cell.chemistry, Chemistry::NiMh);
    assert!((cell.soc - 50.0).abs() < 1e-6);
    assert!((cell.capacity - 1.2).abs() < EPS);
}

#[test]
fn test_configure_unknown_cell_is_rejected() {
    let config = free_running_config(1);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let command = Command::ConfigureCell {
        cell_id: CellId("cell_9999".to_string()),
        params: CellParams {
            chemistry: Chemistry::Nmc,
            voltage: 3.7,
            current: 0.0,
            temperature: 25.0,
        },
    };
    let events = tick(&mut state, &[command], &config, &mut rng);
    match &events[0].event {
        Event::CommandRejected { reason } => assert!(reason.contains("cell_9999")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn test_invalid_task_duration_leaves_queue_unchanged() {
    let config = task_driven_config(1);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let commands = [
        Command::EnqueueTask {
            kind: charge_task(1.0),
            duration_s: 10.0,
        },
        Command::EnqueueTask {
            kind: TaskKind::Idle,
            duration_s: 0.0,
        },
    ];
    let events = tick(&mut state, &commands, &config, &mut rng);

    assert_eq!(state.sequencer.len(), 1);
    assert!(matches!(events[0].event, Event::TaskEnqueued { index: 0, .. }));
    assert!(matches!(events[1].event, Event::CommandRejected { .. }));
}

#[test]
fn test_reset_history_clears_and_stops() {
    let config = free_running_config(2);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    tick(&mut state, &[Command::Start], &config, &mut rng);
    run_ticks(&mut state, &config, &mut rng, 4);
    assert_eq!(state.history.aggregate.len(), 5);

    let events = tick(&mut state, &[Command::ResetHistory], &config, &mut rng);
    assert_eq!(
        kinds(&events),
        vec![&Event::SimulationStopped, &Event::HistoryReset]
    );
    assert!(!state.running);
    assert!(state.history.aggregate.is_empty());
    assert!(state.history.cells.is_empty());
}

#[test]
fn test_clear_sequence_while_running() {
    let config = task_driven_config(1);
    let mut state = base_state(&config);
    let mut rng = make_rng();

    let enqueue = Command::EnqueueTask {
        kind: charge_task(1.0),
        duration_s: 30.0,
    };
    tick(&mut state, &[enqueue, Command::Start], &config, &mut rng);
    run_ticks(&mut state, &config, &mut rng, 3);

    let events = tick(&mut state, &[Command::ClearSequence], &config, &mut rng);
    assert_eq!(events[0].event, Event::SequenceCleared);
    assert!(state.sequencer.is_empty());
    assert_eq!(state.sequencer.step_index(), 0);
    assert_eq!(state.sequencer.task_started_at(), None);
    assert!(state.running);

    let cell = state.store.iter().next().unwrap();
    assert_eq!(cell.mode, OperatingMode::Idle);
    assert!(cell.current.abs() < EPS);
}
