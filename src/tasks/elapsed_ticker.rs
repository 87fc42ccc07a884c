//! Display ticker for running timers

use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::WidgetState;

/// Background task that refreshes elapsed time once per period while any
/// tracked timer runs, and sleeps otherwise
pub async fn elapsed_ticker_task(state: Arc<WidgetState>, period: Duration) {
    info!("Starting elapsed ticker task");

    let mut running_rx = state.subscribe_running();

    loop {
        if !*running_rx.borrow_and_update() {
            if running_rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        debug!("Timer running, starting display interval");
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = state.refresh_timers(Instant::now()) {
                        error!("Failed to refresh timers: {}", e);
                    }
                }

                changed = running_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !*running_rx.borrow_and_update() {
                        debug!("No timer running, stopping display interval");
                        break;
                    }
                }
            }
        }
    }
}
