//! Dashboard Timers - headless dashboard widgets for named timers
//!
//! This is the main entry point: it mounts one widget against the configured
//! backend and serves its state over a small host shim.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use dashboard_timers::{
    config::Config,
    api::create_router,
    services::{EventBus, HttpBackend, LogNotifier},
    utils::shutdown_signal,
    widget::{mount, WidgetDeps},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("dashboard_timers={},tower_http=info", config.log_level()))
        .init();

    info!("Starting dashboard-timers v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: backend={}, timers={:?}, poll={}s",
          config.backend, config.timers, config.poll_interval);

    let backend = HttpBackend::new(config.backend.clone(), config.token.clone(), config.request_timeout())?;
    let deps = WidgetDeps {
        backend: Arc::new(backend),
        bus: EventBus::new(),
        notifier: Arc::new(LogNotifier),
    };

    // Mount the widget; this starts the initial sync and background tasks
    let mut widget = mount(config.widget_config(), deps);

    let app = create_router(Arc::clone(widget.core()));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Host shim running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /status            - Current widget snapshot");
    info!("  GET  /widget            - Rendered widget markup");
    info!("  POST /events/:event     - Emit a host event (timer-started, timer-stopped, ...)");
    info!("  POST /timers/:name/stop - Stop a running timer");
    info!("  POST /resync            - Re-sync timers and incidents");
    info!("  GET  /health            - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    widget.teardown();
    info!("Shutdown complete");
    Ok(())
}
