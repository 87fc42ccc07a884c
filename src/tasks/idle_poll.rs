//! Idle polling background task

use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::widget::WidgetCore;

/// Background task that re-checks every tracked timer while none is running.
///
/// Polling is suspended as soon as any timer runs: the display ticker keeps
/// the view live and the host emits an event when the timer stops.
pub async fn idle_poll_task(core: Arc<WidgetCore>) {
    info!("Starting idle poll task");

    let period = core.config().poll_interval;
    let mut running_rx = core.state().subscribe_running();

    loop {
        if *running_rx.borrow_and_update() {
            debug!("Tracked timer running, idle polling suspended");
            if running_rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        debug!("No tracked timer running, idle polling every {:?}", period);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Idle poll tick");
                    core.check_all().await;
                    if *running_rx.borrow() {
                        info!("Timer started, suspending idle polling");
                        break;
                    }
                }

                changed = running_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *running_rx.borrow_and_update() {
                        info!("Timer started, suspending idle polling");
                        break;
                    }
                }
            }
        }
    }
}
