//! `/api/control/*` handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::ws;
use crate::control::{
    Ack, ControlSurface, DiagnosticCheck, RestartAllReport, RestartReport, StartAllReport, StatusReport,
    StopAllReport,
};
use crate::state::LogEntry;

pub(crate) const DEFAULT_LOG_LIMIT: usize = 100;

pub(crate) fn router() -> Router<ControlSurface> {
    Router::new()
        .route("/start", post(start_all))
        .route("/stop", post(stop_all))
        .route("/restart/{name}", post(restart))
        .route("/restart-all", post(restart_all))
        .route("/monitoring/pause", post(pause_monitoring))
        .route("/monitoring/resume", post(resume_monitoring))
        .route("/status", get(status))
        .route("/logs", get(logs).delete(clear_logs))
        .route("/diagnostic", post(diagnostic))
        .route("/ws", get(ws::upgrade))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogsQuery {
    pub limit: Option<usize>,
}

pub(crate) async fn start_all(State(surface): State<ControlSurface>) -> Json<StartAllReport> {
    info!("start-all requested");
    Json(surface.start_all().await)
}

pub(crate) async fn stop_all(State(surface): State<ControlSurface>) -> Json<StopAllReport> {
    info!("stop-all requested");
    Json(surface.stop_all().await)
}

pub(crate) async fn restart(
    State(surface): State<ControlSurface>,
    Path(name): Path<String>,
) -> ApiResult<Json<RestartReport>> {
    if surface.supervisor().registry().get(&name).is_none() {
        return Err(ApiError::not_found(format!("service '{name}'")));
    }
    info!(service = %name, "restart requested");
    Ok(Json(surface.restart(&name).await))
}

pub(crate) async fn restart_all(State(surface): State<ControlSurface>) -> Json<RestartAllReport> {
    info!("restart-all requested");
    Json(surface.restart_all().await)
}

pub(crate) async fn pause_monitoring(State(surface): State<ControlSurface>) -> Json<Ack> {
    Json(surface.pause_monitoring())
}

pub(crate) async fn resume_monitoring(State(surface): State<ControlSurface>) -> Json<Ack> {
    Json(surface.resume_monitoring())
}

pub(crate) async fn status(State(surface): State<ControlSurface>) -> Json<StatusReport> {
    Json(surface.status())
}

pub(crate) async fn logs(
    State(surface): State<ControlSurface>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    Json(surface.logs(query.limit.unwrap_or(DEFAULT_LOG_LIMIT)))
}

pub(crate) async fn clear_logs(State(surface): State<ControlSurface>) -> Json<Ack> {
    Json(surface.clear_logs())
}

pub(crate) async fn diagnostic(State(surface): State<ControlSurface>) -> Json<Vec<DiagnosticCheck>> {
    Json(surface.diagnostic().await)
}
