//! HTTP API module
//!
//! A small host shim: it exposes a mounted widget's state and render output,
//! and lets an outside producer emit host events onto the widget's bus.

pub mod handlers;
pub mod responses;

use std::{sync::Arc, time::Instant};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::widget::WidgetCore;
use handlers::*;

/// State shared by the handlers
pub struct HostState {
    pub core: Arc<WidgetCore>,
    pub start_time: Instant,
}

impl HostState {
    pub fn new(core: Arc<WidgetCore>) -> Self {
        Self {
            core,
            start_time: Instant::now(),
        }
    }
}

/// Create the HTTP router with all endpoints
pub fn create_router(core: Arc<WidgetCore>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/widget", get(widget_handler))
        .route("/events/:event", post(emit_handler))
        .route("/timers/:name/stop", post(stop_handler))
        .route("/resync", post(resync_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(Arc::new(HostState::new(core)))
}
