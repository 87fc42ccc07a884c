//! Bridge from host timer events to timer re-checks

use std::sync::Arc;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info};

use crate::{
    services::{
        bus::{TIMER_STARTED, TIMER_STOPPED},
        EventBus, HandlerId, HostEvent,
    },
    widget::WidgetCore,
};

/// Handlers the bridge registered on the bus
#[derive(Debug)]
pub struct BridgeSubscription {
    started: HandlerId,
    stopped: HandlerId,
}

impl BridgeSubscription {
    /// Remove both handlers from the bus
    pub fn unsubscribe(self, bus: &EventBus) {
        bus.off(TIMER_STARTED, self.started);
        bus.off(TIMER_STOPPED, self.stopped);
        debug!("Host event bridge unsubscribed");
    }
}

/// Register the timer event handlers, events are forwarded to the returned receiver
pub fn subscribe(bus: &EventBus) -> (BridgeSubscription, mpsc::UnboundedReceiver<HostEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let started_tx = tx.clone();
    let started = bus.on(TIMER_STARTED, move |event| {
        if started_tx.send(event.clone()).is_err() {
            debug!("Bridge closed, dropping {}", event.name);
        }
    });
    let stopped = bus.on(TIMER_STOPPED, move |event| {
        if tx.send(event.clone()).is_err() {
            debug!("Bridge closed, dropping {}", event.name);
        }
    });

    (BridgeSubscription { started, stopped }, rx)
}

/// Background task that re-checks timers after host events.
///
/// The debounce gives the backend time to commit the write that triggered
/// the event before it is read back.
pub async fn event_bridge_task(core: Arc<WidgetCore>, mut events: mpsc::UnboundedReceiver<HostEvent>) {
    info!("Starting host event bridge");

    let debounce = core.config().event_debounce;
    while let Some(event) = events.recv().await {
        debug!("Host event {} received, re-checking in {:?}", event.name, debounce);
        sleep(debounce).await;
        core.handle_host_event(&event).await;
    }
}
