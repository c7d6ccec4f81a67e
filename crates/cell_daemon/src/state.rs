use cell_control::ChargeCycleController;
use cell_core::{Command, EventEnvelope, SimConfig, SimulationState};
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct SimState {
    pub sim: SimulationState,
    pub config: SimConfig,
    pub rng: ChaCha8Rng,
    /// Validated commands waiting for the next tick, in arrival order.
    pub pending: Vec<Command>,
    pub autopilot: Option<ChargeCycleController>,
}

impl SimState {
    pub fn new(sim: SimulationState, config: SimConfig, rng: ChaCha8Rng) -> Self {
        Self {
            sim,
            config,
            rng,
            pending: Vec::new(),
            autopilot: None,
        }
    }
}

pub type SharedSim = Arc<Mutex<SimState>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub event_tx: EventTx,
    pub ticks_per_sec: f64,
}
