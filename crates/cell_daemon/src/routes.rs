use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use cell_control::{validate_cell_params, validate_command};
use cell_core::export::{to_json, write_csv};
use cell_core::{
    cell_statistics, compute_fleet_metrics, export_cells, AggregateSnapshot, CellId, CellParams,
    CellSample, Chemistry, Command, CoreError, EventEnvelope,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, HeaderValue::from_static("http://localhost:5173"))
}

pub fn make_router_with_cors(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/history", get(history_handler))
        .route("/api/v1/cells/:id/history", get(cell_history_handler))
        .route("/api/v1/cells/:id", post(configure_cell_handler))
        .route("/api/v1/analytics", get(analytics_handler))
        .route("/api/v1/export", get(export_handler))
        .route("/api/v1/commands", post(command_handler))
        .route("/api/v1/stream", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.to_string() })),
    )
        .into_response()
}

fn rejected(err: &CoreError) -> Response {
    let status = match err {
        CoreError::UnknownCell(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err)
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    Json(serde_json::json!({
        "tick": sim.sim.meta.tick,
        "seed": sim.sim.meta.seed,
        "elapsed_s": sim.sim.meta.elapsed_s,
        "variant": sim.sim.meta.variant,
        "running": sim.sim.running,
        "cell_count": sim.sim.store.len(),
        "tick_rate_hz": sim.config.tick_rate_hz,
        "ticks_per_sec": app_state.ticks_per_sec,
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app_state.sim.lock();
    match serde_json::to_string(&sim.sim) {
        Ok(json) => {
            drop(sim);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
        }
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            drop(sim);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn history_handler(State(app_state): State<AppState>) -> Json<Vec<AggregateSnapshot>> {
    let sim = app_state.sim.lock();
    Json(sim.sim.history.aggregate.to_vec())
}

pub async fn cell_history_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CellSample>>, Response> {
    let id = CellId(id);
    let sim = app_state.sim.lock();
    let samples: Vec<CellSample> = sim.sim.history.samples_for(&id).cloned().collect();
    // Removed cells keep their samples until evicted.
    if samples.is_empty() && sim.sim.store.get(&id).is_none() {
        return Err(rejected(&CoreError::UnknownCell(id)));
    }
    Ok(Json(samples))
}

pub async fn analytics_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    let fleet = compute_fleet_metrics(sim.sim.store.iter()).ok();
    let cells = cell_statistics(sim.sim.history.cells.iter());
    Json(serde_json::json!({
        "tick": sim.sim.meta.tick,
        "fleet": fleet,
        "cells": cells,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn export_handler(
    State(app_state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let records = {
        let sim = app_state.sim.lock();
        export_cells(&sim.sim.store, &sim.config.chemistry_table, chrono::Utc::now())
    };
    let format = query.format.as_deref().unwrap_or("json");
    let (content_type, body) = match format {
        "csv" => {
            let mut buffer = Vec::new();
            let rendered = write_csv(&mut buffer, &records).and_then(|()| {
                String::from_utf8(buffer).map_err(|e| {
                    CoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })
            });
            ("text/csv", rendered)
        }
        "json" => ("application/json", to_json(&records)),
        other => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("unknown export format '{other}', expected csv or json"),
            );
        }
    };
    match body {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(err) => {
            tracing::error!("export serialization failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failed")
        }
    }
}

/// Validates a command and queues it for the next tick.
pub async fn command_handler(
    State(app_state): State<AppState>,
    Json(command): Json<Command>,
) -> Response {
    let mut sim = app_state.sim.lock();
    if let Err(err) = validate_command(&command, &sim.config.constants) {
        return rejected(&err);
    }
    sim.pending.push(command);
    let queued = sim.pending.len();
    drop(sim);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "queued": queued })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ConfigureCellRequest {
    pub chemistry: String,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
}

/// Resolves the chemistry key with the configured policy, then queues a
/// `ConfigureCell` for the next tick.
pub async fn configure_cell_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ConfigureCellRequest>,
) -> Response {
    let cell_id = CellId(id);
    let mut sim = app_state.sim.lock();
    if sim.sim.store.get(&cell_id).is_none() {
        return rejected(&CoreError::UnknownCell(cell_id));
    }
    let chemistry = match Chemistry::resolve(&request.chemistry, sim.config.chemistry_policy) {
        Ok(chemistry) => chemistry,
        Err(err) => return rejected(&err),
    };
    let params = CellParams {
        chemistry,
        voltage: request.voltage,
        current: request.current,
        temperature: request.temperature,
    };
    if let Err(err) = validate_cell_params(&params, &sim.config.constants.input) {
        return rejected(&err);
    }
    sim.pending.push(Command::ConfigureCell { cell_id, params });
    drop(sim);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "chemistry": chemistry.label() })),
    )
        .into_response()
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let sim = app_state.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(1));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(100));
        flush.tick().await;
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        match serde_json::to_string(&pending) {
                            Ok(data) => yield Ok(Event::default().event("events").data(data)),
                            Err(err) => tracing::error!("event serialization failed: {err}"),
                        }
                        pending.clear();
                    }
                }
                _ = heartbeat.tick() => {
                    let (tick, running) = {
                        let guard = sim.lock();
                        (guard.sim.meta.tick, guard.sim.running)
                    };
                    let hb = serde_json::json!({
                        "heartbeat": true,
                        "tick": tick,
                        "running": running,
                    });
                    yield Ok(Event::default().event("heartbeat").data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
