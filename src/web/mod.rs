use std::{
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    city::{CityMap, MapError, TileCode, EMPTY_TILE},
    config::{ConfigError, TileTypes, WindConfig},
    engine::DataManager,
    power::EnergyLoss,
    scenario::Scenario,
    snapshot::{DashboardSnapshot, SnapshotWriter},
    sources::{ComplianceState, SlipstreamData, WindTurbinesData},
    spatial::TilePos,
    wind::{Compass, WindConditions, WindDirection},
};

/// The live map of one city and the data manager refreshed from it.
pub struct CitySession {
    pub map: CityMap,
    pub manager: DataManager,
    snapshots: Option<SnapshotWriter>,
}

impl CitySession {
    pub fn new(map: CityMap, manager: DataManager) -> Self {
        Self {
            map,
            manager,
            snapshots: None,
        }
    }

    /// Recalculate every source and capture the dashboard state.
    pub fn refresh(&mut self) -> Result<DashboardSnapshot> {
        self.manager.calculate(&self.map)?;
        if let Some(writer) = &self.snapshots {
            if let Err(err) = writer.maybe_write(&self.manager, &self.map) {
                warn!(%err, "failed to write snapshot");
            }
        }
        Ok(DashboardSnapshot::capture(&self.manager, &self.map))
    }
}

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<CitySession>>,
    broadcaster: broadcast::Sender<String>,
    tile_types: TileTypes,
    wind_config: WindConfig,
}

impl AppState {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let map = scenario.build_city();
        let manager = scenario.data_manager()?;
        let (broadcaster, _) = broadcast::channel::<String>(256);
        let state = Self {
            session: Arc::new(Mutex::new(CitySession::new(map, manager))),
            broadcaster,
            tile_types: scenario.tile_types.clone(),
            wind_config: scenario.wind,
        };
        state.lock().refresh()?;
        Ok(state)
    }

    pub fn with_snapshots(self, writer: SnapshotWriter) -> Self {
        {
            let mut session = self.lock();
            session.snapshots = Some(writer);
        }
        self
    }

    /// A poisoned lock still holds a consistent map: every mutation is followed by a
    /// full recalculation before the guard is released.
    fn lock(&self) -> MutexGuard<'_, CitySession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, snapshot: &DashboardSnapshot) {
        if let Ok(payload) = serde_json::to_string(snapshot) {
            // No subscribers is fine.
            let _ = self.broadcaster.send(payload);
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<MapError> for ApiError {
    fn from(err: MapError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                warn!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub snapshot_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/losses", get(losses))
        .route("/api/compliance", get(compliance))
        .route("/api/events", get(stream_events))
        .route("/api/wind", post(update_wind))
        .route("/api/tiles", post(update_tiles))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        snapshot_dir,
        host,
        port,
    } = config;

    let mut state = AppState::new(&scenario)?;
    if let Some(dir) = snapshot_dir {
        state = state.with_snapshots(SnapshotWriter::new(dir, scenario.snapshot_interval));
    }

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr).await?;
    info!(city = %scenario.name, %addr, "dashboard api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down dashboard api");
}

async fn latest_state(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    let session = state.lock();
    Json(DashboardSnapshot::capture(&session.manager, &session.map))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LossesResponse {
    pub direction: Option<WindDirection>,
    pub losses: Vec<Vec<f64>>,
    pub energy_losses: Vec<EnergyLoss>,
    pub lifespan_index: u8,
    pub power_kw: f64,
}

async fn losses(State(state): State<AppState>) -> Json<LossesResponse> {
    let session = state.lock();
    let source = session.manager.source::<SlipstreamData>();
    let report = source.and_then(SlipstreamData::report);
    Json(LossesResponse {
        direction: report.and_then(|report| report.direction),
        losses: report
            .map(|report| report.losses.to_rows())
            .unwrap_or_default(),
        energy_losses: source
            .map(|source| source.energy_losses().to_vec())
            .unwrap_or_default(),
        lifespan_index: source.map(SlipstreamData::lifespan_index).unwrap_or(5),
        power_kw: source.map(SlipstreamData::power_kw).unwrap_or(0.0),
    })
}

async fn compliance(State(state): State<AppState>) -> Json<Option<ComplianceState>> {
    let session = state.lock();
    Json(
        session
            .manager
            .source::<WindTurbinesData>()
            .and_then(WindTurbinesData::state)
            .cloned(),
    )
}

/// Either explicit values or raw knob turns; explicit values win.
#[derive(Debug, Default, Deserialize)]
pub struct WindUpdate {
    pub compass: Option<Compass>,
    pub speed_kmh: Option<f64>,
    pub direction_turns: Option<f64>,
    pub speed_turns: Option<f64>,
}

async fn update_wind(
    State(state): State<AppState>,
    Json(update): Json<WindUpdate>,
) -> Result<Json<DashboardSnapshot>, ApiError> {
    if let Some(speed) = update.speed_kmh {
        if !speed.is_finite() || speed < 0.0 {
            return Err(ApiError::BadRequest(format!(
                "wind speed must be a non-negative number, got {speed}"
            )));
        }
    }
    let snapshot = {
        let mut session = state.lock();
        let current = *session.manager.wind();
        let from_knobs = WindConditions::from_knobs(
            update.direction_turns.unwrap_or(0.0),
            update.speed_turns.unwrap_or(0.0),
            &state.wind_config,
        );
        let compass = update.compass.unwrap_or(if update.direction_turns.is_some() {
            from_knobs.compass
        } else {
            current.compass
        });
        let speed_kmh = update.speed_kmh.unwrap_or(if update.speed_turns.is_some() {
            from_knobs.speed_kmh
        } else {
            current.speed_kmh
        });
        session
            .manager
            .set_wind(WindConditions::new(compass, speed_kmh));
        info!(%compass, speed_kmh, "wind changed");
        let snapshot = session.refresh()?;
        // Publish under the lock so subscribers see refreshes in order.
        state.publish(&snapshot);
        snapshot
    };
    Ok(Json(snapshot))
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TileUpdate {
    pub x: usize,
    pub y: usize,
    pub code: TileCode,
}

async fn update_tiles(
    State(state): State<AppState>,
    Json(updates): Json<Vec<TileUpdate>>,
) -> Result<Json<DashboardSnapshot>, ApiError> {
    if let Some(unknown) = updates
        .iter()
        .find(|update| update.code != EMPTY_TILE && !state.tile_types.0.contains_key(&update.code))
    {
        return Err(ApiError::BadRequest(format!(
            "unknown tile code {}",
            unknown.code
        )));
    }
    let snapshot = {
        let mut session = state.lock();
        let width = session.map.width();
        let height = session.map.height();
        if let Some(outside) = updates
            .iter()
            .find(|update| update.x >= width || update.y >= height)
        {
            return Err(MapError::OutOfBounds {
                x: outside.x,
                y: outside.y,
                width,
                height,
            }
            .into());
        }
        for update in &updates {
            session.map.set(TilePos::new(update.x, update.y), update.code)?;
        }
        info!(changed = updates.len(), "tiles updated");
        let snapshot = session.refresh()?;
        state.publish(&snapshot);
        snapshot
    };
    Ok(Json(snapshot))
}

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
