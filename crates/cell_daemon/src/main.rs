mod routes;
mod state;
mod tick_loop;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use cell_control::ChargeCycleController;
use cell_core::{Command, Variant};
use cell_world::{build_initial_state, default_config, load_config};
use clap::Parser;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use state::{AppState, SimState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "cell_daemon", about = "Battery cell simulation HTTP daemon")]
struct Cli {
    /// JSON config file. Defaults to the built-in free-running config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the built-in task-driven config when no --config is given.
    #[arg(long, conflicts_with = "config")]
    task_driven: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Wall-clock pacing. Defaults to the config's tick rate; 0 runs unpaced.
    #[arg(long)]
    ticks_per_sec: Option<f64>,
    /// Stop the tick loop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Queue a Start command before the first tick.
    #[arg(long)]
    autostart: bool,
    /// Drive repeated charge/rest/discharge cycles (task-driven only).
    #[arg(long)]
    autopilot: bool,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None if cli.task_driven => default_config(Variant::TaskDriven),
        None => default_config(Variant::FreeRunning),
    };
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let sim_state = build_initial_state(&config, seed, &mut rng)?;
    let ticks_per_sec =
        tick_loop::check_ticks_per_sec(cli.ticks_per_sec.unwrap_or(config.tick_rate_hz))
            .context("invalid --ticks-per-sec")?;
    let cors_origin: HeaderValue = cli
        .cors_origin
        .parse()
        .with_context(|| format!("invalid --cors-origin '{}'", cli.cors_origin))?;

    tracing::info!(
        seed,
        variant = ?config.variant,
        cells = sim_state.store.len(),
        ticks_per_sec,
        "simulation initialised"
    );

    let mut sim = SimState::new(sim_state, config, rng);
    if cli.autopilot {
        sim.autopilot = Some(ChargeCycleController::default());
    }
    if cli.autostart {
        sim.pending.push(Command::Start);
    }

    let shared = Arc::new(Mutex::new(sim));
    let (event_tx, _) = broadcast::channel(256);
    let app_state = AppState {
        sim: shared.clone(),
        event_tx: event_tx.clone(),
        ticks_per_sec,
    };

    tokio::spawn(tick_loop::run_tick_loop(
        shared,
        event_tx,
        ticks_per_sec,
        cli.max_ticks,
    ));

    let router = routes::make_router_with_cors(app_state, cors_origin);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(())
}
