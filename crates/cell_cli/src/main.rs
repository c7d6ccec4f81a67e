use anyhow::{Context, Result};
use cell_control::{ChargeCycleController, CommandSource, ScriptedController};
use cell_core::export::{write_csv_file, write_json_file};
use cell_core::{
    compute_fleet_metrics, export_cells, Command, Event, EventEnvelope, SimConfig,
    SimulationState, SnapshotFileWriter, Variant,
};
use cell_world::{build_initial_state, default_config, load_config};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "cell_cli", about = "Battery cell monitoring simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    FreeRunning,
    TaskDriven,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::FreeRunning => Variant::FreeRunning,
            VariantArg::TaskDriven => Variant::TaskDriven,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Random seed. Drawn from the OS when omitted.
        #[arg(long)]
        seed: Option<u64>,
        /// JSON config file. Mutually exclusive with --variant.
        #[arg(long, conflicts_with = "variant")]
        config: Option<PathBuf>,
        /// Built-in config to use when no --config is given.
        #[arg(long, value_enum, default_value = "free-running")]
        variant: VariantArg,
        /// JSON list of `{ "at_tick", "command" }` entries replayed during the run.
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Disable the charge-cycle autopilot in task-driven runs.
        #[arg(long)]
        no_autopilot: bool,
        #[arg(long, default_value_t = 10)]
        print_every: u64,
        /// Write an aggregate row every N ticks.
        #[arg(long, default_value_t = 1)]
        metrics_every: u64,
        /// Disable the runs/ directory output.
        #[arg(long)]
        no_metrics: bool,
        #[arg(long, default_value = "runs")]
        runs_dir: PathBuf,
    },
}

struct RunArgs {
    ticks: u64,
    seed: Option<u64>,
    config: Option<PathBuf>,
    variant: Variant,
    scenario: Option<PathBuf>,
    autopilot: bool,
    print_every: u64,
    metrics_every: u64,
    no_metrics: bool,
    runs_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn generate_run_id(seed: u64) -> String {
    let now = chrono::Utc::now();
    format!("{}_seed{seed}", now.format("%Y%m%d_%H%M%S"))
}

fn create_run_dir(runs_dir: &Path, run_id: &str) -> Result<PathBuf> {
    let dir = runs_dir.join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

fn write_run_info(
    dir: &Path,
    run_id: &str,
    seed: u64,
    args: &RunArgs,
    config: &SimConfig,
) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": seed,
        "start_time": run_id.split('_').take(2).collect::<Vec<_>>().join("_"),
        "variant": config.variant,
        "cell_count": config.cell_count,
        "tick_rate_hz": config.tick_rate_hz,
        "metrics_every": args.metrics_every,
        "runner": "cell_cli",
        "args": {
            "ticks": args.ticks,
            "print_every": args.print_every,
            "config": args.config.as_ref().map(|p| p.display().to_string()),
            "scenario": args.scenario.as_ref().map(|p| p.display().to_string()),
            "autopilot": args.autopilot,
        }
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn load_scenario(path: &Path, config: &SimConfig) -> Result<ScriptedController> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario file: {}", path.display()))?;
    ScriptedController::from_json(&json, &config.constants)
        .with_context(|| format!("parsing scenario file: {}", path.display()))
}

fn log_events(events: &[EventEnvelope]) {
    for envelope in events {
        match &envelope.event {
            Event::SimulationStarted => tracing::info!(tick = envelope.tick, "simulation started"),
            Event::SimulationStopped => tracing::info!(tick = envelope.tick, "simulation stopped"),
            Event::SequenceCompleted { tasks } => {
                tracing::info!(tick = envelope.tick, tasks, "task sequence completed");
            }
            Event::TaskStarted { index, task } => {
                tracing::debug!(tick = envelope.tick, index, task = %task, "task started");
            }
            Event::CommandRejected { reason } => {
                tracing::warn!(tick = envelope.tick, reason = %reason, "command rejected");
            }
            _ => {}
        }
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(args.variant),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = build_initial_state(&config, seed, &mut rng)?;

    let mut scripted = args
        .scenario
        .as_deref()
        .map(|path| load_scenario(path, &config))
        .transpose()?;
    let mut autopilot = args.autopilot.then(ChargeCycleController::default);

    // Set up per-run output directory.
    let mut run_dir: Option<PathBuf> = None;
    let mut snapshot_writer: Option<SnapshotFileWriter> = None;
    if !args.no_metrics {
        let run_id = generate_run_id(seed);
        let dir = create_run_dir(&args.runs_dir, &run_id)?;
        write_run_info(&dir, &run_id, seed, args, &config)?;
        let writer = SnapshotFileWriter::new(dir.clone())
            .with_context(|| format!("opening aggregate CSV in {}", dir.display()))?;
        snapshot_writer = Some(writer);
        println!("Run directory: {}", dir.display());
        run_dir = Some(dir);
    }

    println!(
        "Starting simulation: ticks={} seed={seed} variant={:?} cells={}",
        args.ticks,
        config.variant,
        state.store.len(),
    );
    println!("{}", "-".repeat(80));

    for _ in 0..args.ticks {
        let mut commands: Vec<Command> = Vec::new();
        if state.meta.tick == 0 && scripted.is_none() {
            commands.push(Command::Start);
        }
        if let Some(source) = scripted.as_mut() {
            commands.extend(source.generate_commands(&state, &config));
        }
        if let Some(source) = autopilot.as_mut() {
            commands.extend(source.generate_commands(&state, &config));
        }

        let current_tick = state.meta.tick;
        let events = cell_core::tick(&mut state, &commands, &config, &mut rng);
        log_events(&events);

        if args.print_every > 0 && state.meta.tick % args.print_every == 0 {
            print_status(&state);
        }

        if let Some(writer) = snapshot_writer.as_mut() {
            // Only ticks that actually recorded a snapshot produce a row.
            let recorded = state
                .history
                .aggregate
                .latest()
                .filter(|snapshot| snapshot.tick == current_tick);
            if let Some(snapshot) = recorded {
                if args.metrics_every > 0 && current_tick % args.metrics_every == 0 {
                    writer.write_row(snapshot).context("writing aggregate row")?;
                }
            }
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);

    if let (Some(writer), Some(dir)) = (snapshot_writer.as_mut(), run_dir.as_deref()) {
        writer.flush().context("final aggregate flush")?;
        write_final_exports(dir, &state, &config)?;
        println!("Outputs written to {}", dir.display());
    }

    Ok(())
}

fn write_final_exports(dir: &Path, state: &SimulationState, config: &SimConfig) -> Result<()> {
    let records = export_cells(&state.store, &config.chemistry_table, chrono::Utc::now());
    write_csv_file(&dir.join("cells.csv"), &records).context("writing cells.csv")?;
    write_json_file(&dir.join("cells.json"), &records).context("writing cells.json")?;
    let samples = state.history.cells.to_vec();
    write_csv_file(&dir.join("cell_history.csv"), &samples).context("writing cell_history.csv")?;
    Ok(())
}

fn print_status(state: &SimulationState) {
    let tick = state.meta.tick;
    let elapsed = state.meta.elapsed_s;
    let task = state
        .history
        .cells
        .latest()
        .map_or("-", |sample| sample.task.as_str());
    let task = if task.is_empty() { "-" } else { task };

    match compute_fleet_metrics(state.store.iter()) {
        Ok(m) => println!(
            "[tick={tick:04}  t={elapsed:7.1}s]  cells={cells:2}  running={running:5}  \
             avg_v={avg_v:.3}  avg_t={avg_t:5.1}  avg_soc={avg_soc:5.1}  \
             avg_health={avg_h:5.1}  task={task}",
            cells = m.cell_count,
            running = state.running,
            avg_v = m.avg_voltage,
            avg_t = m.avg_temperature,
            avg_soc = m.avg_soc,
            avg_h = m.avg_health,
        ),
        Err(_) => println!(
            "[tick={tick:04}  t={elapsed:7.1}s]  cells= 0  running={running:5}",
            running = state.running,
        ),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            config,
            variant,
            scenario,
            no_autopilot,
            print_every,
            metrics_every,
            no_metrics,
            runs_dir,
        } => {
            run(&RunArgs {
                ticks,
                seed,
                config,
                variant: variant.into(),
                scenario,
                autopilot: !no_autopilot,
                print_every,
                metrics_every,
                no_metrics,
                runs_dir,
            })?;
        }
    }
    Ok(())
}
