use std::{convert::Infallible, net::SocketAddr, ops::ControlFlow, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};

use crate::{
    config::{ConfigError, ScenarioConfig},
    engine,
    live::{run_live, LiveOptions},
    stats::{monte_carlo, AnalysisError},
    store::{RunStore, StoreError},
    sweep::sweep,
};

pub const DEFAULT_WATERING_LEVELS: [f64; 3] = [0.2, 0.5, 0.8];
pub const DEFAULT_PESTICIDE_CAPS: [f64; 2] = [0.2, 0.5];
pub const DEFAULT_CORRIDOR_LEVELS: [f64; 2] = [0.3, 0.7];

/// Upper bound on seeds per Monte Carlo request.
pub const MAX_MONTE_CARLO_RUNS: u64 = 10_000;
/// Upper bound on days streamed by one live request.
pub const MAX_LIVE_DAYS: u32 = 3_650;

pub struct AppState {
    store: Mutex<RunStore>,
}

impl AppState {
    pub fn new(store: RunStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }
}

pub struct WebServerConfig {
    pub store: RunStore,
    pub host: String,
    pub port: u16,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/simulate", post(simulate))
        .route("/sweep", post(run_sweep))
        .route("/monte-carlo", post(run_monte_carlo))
        .route("/live", post(live))
        .route("/runs/:id", get(get_run))
        .route("/leaderboard", get(leaderboard))
        .fallback(not_found)
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig { store, host, port } = config;
    let state = Arc::new(AppState::new(store));
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down API server");
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::RunNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Accepts either `{ "scenario": {...}, ... }` or a bare scenario document.
fn scenario_from_body(body: &Value) -> Result<ScenarioConfig, ConfigError> {
    let raw = body.get("scenario").cloned().unwrap_or_else(|| body.clone());
    ScenarioConfig::from_value(raw)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepRequest {
    watering_levels: Option<Vec<f64>>,
    pesticide_caps: Option<Vec<f64>>,
    corridor_levels: Option<Vec<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonteCarloRequest {
    seed_start: Option<u64>,
    runs: Option<u64>,
    confidence_level: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveRequest {
    interval_ms: Option<u64>,
    max_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    limit: Option<usize>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn simulate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let scenario = scenario_from_body(&body)?;
    let result = tokio::task::spawn_blocking(move || engine::run(&scenario)).await?;
    let run_id = state
        .store
        .lock()
        .await
        .save(&result, json!({ "mode": "api/simulate" }))?;
    Ok(Json(json!({ "runId": run_id, "result": result })))
}

pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let scenario = scenario_from_body(&body)?;
    let request: SweepRequest = serde_json::from_value(body)?;
    let watering = request
        .watering_levels
        .unwrap_or_else(|| DEFAULT_WATERING_LEVELS.to_vec());
    let pesticides = request
        .pesticide_caps
        .unwrap_or_else(|| DEFAULT_PESTICIDE_CAPS.to_vec());
    let corridors = request
        .corridor_levels
        .unwrap_or_else(|| DEFAULT_CORRIDOR_LEVELS.to_vec());

    let results =
        tokio::task::spawn_blocking(move || sweep(&scenario, &watering, &pesticides, &corridors))
            .await?;
    let store = state.store.lock().await;
    let mut run_ids = Vec::with_capacity(results.len());
    for (index, result) in results.iter().enumerate() {
        run_ids.push(store.save(result, json!({ "mode": "api/sweep", "rank": index + 1 }))?);
    }
    Ok(Json(json!({
        "runIds": run_ids,
        "count": results.len(),
        "topAverageResilience": results.first().map(|r| r.average_resilience),
    })))
}

pub async fn run_monte_carlo(Json(body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let scenario = scenario_from_body(&body)?;
    let request: MonteCarloRequest = serde_json::from_value(body)?;
    let seed_start = request.seed_start.unwrap_or(scenario.seed);
    let runs = request.runs.unwrap_or(20);
    if runs > MAX_MONTE_CARLO_RUNS {
        return Err(ApiError::bad_request(format!(
            "runs must be at most {MAX_MONTE_CARLO_RUNS}"
        )));
    }
    let seeds: Vec<u64> = (0..runs).map(|i| seed_start.wrapping_add(i)).collect();
    let confidence_level = request.confidence_level.unwrap_or(0.95);
    let summary =
        tokio::task::spawn_blocking(move || monte_carlo(&scenario, &seeds, confidence_level))
            .await??;
    Ok(Json(json!({ "summary": summary })))
}

pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let stored = state.store.lock().await.get(id)?;
    Ok(Json(serde_json::to_value(stored)?))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Value>, ApiError> {
    let rows = state.store.lock().await.top_runs(query.limit.unwrap_or(5))?;
    Ok(Json(json!({ "runs": rows })))
}

/// Streams one `DayState` per event while the run progresses, then a `done`
/// event carrying the final result.
pub async fn live(
    Json(body): Json<Value>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let scenario = scenario_from_body(&body)?;
    let request: LiveRequest = serde_json::from_value(body)?;
    let days = request.max_days.unwrap_or(scenario.days);
    if days > MAX_LIVE_DAYS {
        return Err(ApiError::bad_request(format!(
            "live runs are limited to {MAX_LIVE_DAYS} days"
        )));
    }
    let options = LiveOptions {
        interval: Duration::from_millis(request.interval_ms.unwrap_or(250)),
        max_days: Some(days),
    };

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    tokio::spawn(async move {
        // A send error means the client went away.
        let result = run_live(&scenario, options, |day, _| {
            let payload = serde_json::to_string(day).unwrap_or_default();
            match tx.send(Event::default().data(payload)) {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            }
        })
        .await;
        if let Ok(payload) = serde_json::to_string(&result) {
            let _ = tx.send(Event::default().event("done").data(payload));
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<Event, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(2))))
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "not found".to_string(),
    }
}
