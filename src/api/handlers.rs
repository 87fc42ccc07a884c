//! HTTP endpoint handlers of the host shim

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    error::WidgetError,
    services::EventPayload,
    utils::format_elapsed,
    widget::render,
};
use super::{
    responses::{ActionResponse, EmitResponse, HealthResponse, StatusResponse},
    HostState,
};

/// Handle GET /status - Return the current widget snapshot
pub async fn status_handler(State(host): State<Arc<HostState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let widget = host.core.snapshot().map_err(|e| {
        error!("Failed to get widget snapshot: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(StatusResponse {
        widget,
        uptime: format_elapsed(host.start_time.elapsed().as_secs()),
        timestamp: Utc::now(),
    }))
}

/// Handle GET /widget - Return the rendered widget markup
pub async fn widget_handler(State(host): State<Arc<HostState>>) -> Result<Html<String>, StatusCode> {
    match host.core.snapshot() {
        Ok(snapshot) => Ok(Html(render(&snapshot))),
        Err(e) => {
            error!("Failed to render widget: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /events/:event - Emit a host event on the bus
pub async fn emit_handler(
    State(host): State<Arc<HostState>>,
    Path(event): Path<String>,
    payload: Option<Json<EventPayload>>,
) -> Json<EmitResponse> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let listeners = host.core.bus().emit(&event, payload);
    info!("Host event {} emitted to {} listener(s)", event, listeners);
    Json(EmitResponse { event, listeners })
}

/// Handle POST /timers/:name/stop - Clock out a running timer
pub async fn stop_handler(
    State(host): State<Arc<HostState>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResponse>) {
    match host.core.stop_timer(&name).await {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::ok(format!("Timer {} stopped", name)))),
        Err(e @ WidgetError::TimerNotRunning(_)) => {
            warn!("Stop rejected: {}", e);
            (StatusCode::CONFLICT, Json(ActionResponse::error(e.to_string())))
        }
        Err(e) => {
            error!("Failed to stop timer {}: {}", name, e);
            (StatusCode::BAD_GATEWAY, Json(ActionResponse::error(e.to_string())))
        }
    }
}

/// Handle POST /resync - Re-sync as when the host view regains visibility
pub async fn resync_handler(State(host): State<Arc<HostState>>) -> Json<ActionResponse> {
    host.core.sync().await;
    Json(ActionResponse::ok("Widget re-synced"))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
