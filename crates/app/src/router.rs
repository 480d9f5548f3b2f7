use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use jobtrack_core::projector::Projector;
use jobtrack_core::stats::BoardStats;
use jobtrack_core::{Application, ApplicationId, BoardSnapshot, DragEnd, NewApplication};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio_stream::Stream;
use tracing::info;

use crate::events::{board_stream, keep_alive, parse_types, BoardEvents};
use crate::problem::ProblemResponse;
use crate::sync::{BoardService, DragOutcome, Operation};
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    board: BoardService,
    events: BoardEvents,
    sse_heartbeat: Duration,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        board: BoardService,
        events: BoardEvents,
        sse_heartbeat: Duration,
    ) -> Self {
        Self {
            metrics,
            board,
            events,
            sse_heartbeat,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn board(&self) -> &BoardService {
        &self.board
    }

    pub fn events(&self) -> &BoardEvents {
        &self.events
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/board", get(board_snapshot))
        .route("/board/stats", get(board_stats))
        .route("/board/operations", get(board_operations))
        .route("/board/events", get(board_events))
        .route("/board/drag-end", post(drag_end))
        .route("/board/refresh", post(refresh))
        .route("/applications", post(create_application))
        .route(
            "/applications/:id",
            get(get_application)
                .put(update_application)
                .delete(delete_application),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
}

async fn board_snapshot(
    State(state): State<AppState>,
) -> Result<Json<BoardSnapshot>, ProblemResponse> {
    Ok(Json(state.board().snapshot().await?))
}

async fn board_stats(State(state): State<AppState>) -> Result<Json<BoardStats>, ProblemResponse> {
    Ok(Json(state.board().stats().await?))
}

async fn board_operations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Operation>>, ProblemResponse> {
    Ok(Json(state.board().operations().await?))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    types: Option<String>,
}

/// Streams board patches, starting with a `board.replace` snapshot.
async fn board_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, serde_json::Error>>>, ProblemResponse> {
    let types = parse_types(query.types);
    // Subscribe before reading the snapshot so no patch falls in between.
    let receiver = state.events().subscribe();
    let snapshot = state.board().snapshot().await?;
    let version = snapshot.version;

    let initial = types
        .as_ref()
        .map_or(true, |types| types.contains("board.replace"))
        .then(|| Projector::board_replace(version, Utc::now(), &snapshot));
    let stream = board_stream(receiver, initial, version, types);

    Ok(Sse::new(stream).keep_alive(keep_alive(state.sse_heartbeat)))
}

async fn drag_end(
    State(state): State<AppState>,
    Json(drag): Json<DragEnd>,
) -> Result<Json<DragOutcome>, ProblemResponse> {
    Ok(Json(state.board().drag_end(drag).await?))
}

async fn refresh(State(state): State<AppState>) -> Result<StatusCode, ProblemResponse> {
    state.board().refresh().await?;
    info!(stage = "app", "board refresh requested");
    Ok(StatusCode::ACCEPTED)
}

async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Application>, ProblemResponse> {
    Ok(Json(state.board().get(ApplicationId::new(id)).await?))
}

async fn create_application(
    State(state): State<AppState>,
    Json(application): Json<NewApplication>,
) -> Result<(StatusCode, Json<Application>), ProblemResponse> {
    let created = state.board().create(application).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(application): Json<Application>,
) -> Result<Json<Application>, ProblemResponse> {
    if application.id.as_str() != id {
        return Err(ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "id_mismatch",
            format!("body id {} does not match path id {id}", application.id),
        ));
    }
    Ok(Json(state.board().update(application).await?))
}

async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ProblemResponse> {
    state.board().delete(ApplicationId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
