//! Widget core and mount adapter
//!
//! A widget is mounted with explicitly injected collaborators and returns a
//! [`MountHandle`]. Tearing the handle down synchronously stops every task
//! and handler the widget registered.

pub mod filter;
pub mod render;

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{debug, error, info, warn};

use crate::{
    config::WidgetConfig,
    error::{Result, WidgetError},
    services::{
        backend::form_id,
        bus::{TIMER_STARTED, TIMER_STOPPED},
        Backend, EventBus, EventPayload, HostEvent, Notifier, ResourceKind,
    },
    state::{CountdownChange, IncidentQuery, Reconciled, WidgetSnapshot, WidgetState, ACTIVITY_TIMER},
    tasks::{
        elapsed_ticker_task, event_bridge, event_bridge_task, idle_poll_task, BridgeSubscription,
        CountdownTicker,
    },
    utils::format_elapsed,
};

pub use filter::{DependentFilter, FilterHandle};
pub use render::render;

/// Form fields naming the client and project of an activity timer
pub const SELECTED_CLIENT: &str = "selectedClient";
pub const SELECTED_PROJECT: &str = "selectedProject";

/// Collaborators provided by the host
#[derive(Clone)]
pub struct WidgetDeps {
    pub backend: Arc<dyn Backend>,
    pub bus: EventBus,
    pub notifier: Arc<dyn Notifier>,
}

/// Logic shared by every task of one mounted widget
pub struct WidgetCore {
    state: Arc<WidgetState>,
    backend: Arc<dyn Backend>,
    bus: EventBus,
    notifier: Arc<dyn Notifier>,
    config: WidgetConfig,
    countdown: CountdownTicker,
}

impl WidgetCore {
    pub fn new(config: WidgetConfig, deps: WidgetDeps) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(WidgetState::new(&config.timers)),
            backend: deps.backend,
            bus: deps.bus,
            notifier: deps.notifier,
            config,
            countdown: CountdownTicker::new(),
        })
    }

    pub fn state(&self) -> &Arc<WidgetState> {
        &self.state
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn snapshot(&self) -> Result<WidgetSnapshot> {
        self.state.snapshot()
    }

    /// Whether the countdown interval is still ticking
    pub fn countdown_active(&self) -> bool {
        self.countdown.is_active()
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.config.timers.iter().any(|t| t == name)
    }

    /// Ask the backend about one timer and reconcile local state.
    ///
    /// Failures are logged and leave the previous state in place.
    pub async fn check(&self, name: &str) -> Option<Reconciled> {
        let check = match self.backend.check_timer(name).await {
            Ok(check) => check,
            Err(e) => {
                warn!("Failed to check timer {}: {}", name, e);
                return None;
            }
        };

        let reconciled = match self.state.apply_check(name, &check, Instant::now(), Utc::now()) {
            Ok(reconciled) => reconciled,
            Err(e) => {
                error!("Failed to reconcile timer {}: {}", name, e);
                return None;
            }
        };
        if reconciled.discarded {
            return Some(reconciled);
        }

        self.apply_countdown_change(reconciled.countdown);
        if name == ACTIVITY_TIMER && reconciled.changed && check.running_elapsed().is_some() {
            self.resolve_labels(check.form.as_ref()).await;
        }
        Some(reconciled)
    }

    /// Check every tracked timer in display order
    pub async fn check_all(&self) {
        for name in &self.config.timers {
            self.check(name).await;
        }
    }

    /// Replace the incident batch with today's incidents
    pub async fn reload_incidents(&self) {
        let query = IncidentQuery::for_day(
            Utc::now().date_naive(),
            &self.config.incident_type,
            self.config.incident_limit,
        );
        match self.backend.incidents(&query).await {
            Ok(rows) => {
                debug!("Loaded {} incidents", rows.len());
                match self.state.set_incidents(rows, Instant::now()) {
                    Ok(change) => self.apply_countdown_change(change),
                    Err(e) => error!("Failed to store incidents: {}", e),
                }
            }
            Err(e) => warn!("Failed to load incidents: {}", e),
        }
    }

    /// Full refresh: incidents first so the countdown can pair on the timer check
    pub async fn sync(&self) {
        self.reload_incidents().await;
        self.check_all().await;
    }

    /// Drop the countdown and stop its interval
    pub fn reset_countdown(&self) -> Result<()> {
        self.state.reset_countdown()?;
        self.countdown.stop();
        Ok(())
    }

    fn apply_countdown_change(&self, change: CountdownChange) {
        match change {
            CountdownChange::Started => {
                self.countdown.restart(Arc::clone(&self.state), self.config.tick_interval)
            }
            CountdownChange::Cleared | CountdownChange::Expired => {
                self.countdown.settle(Arc::clone(&self.state), self.config.tick_interval)
            }
            CountdownChange::Unchanged => {}
        }
    }

    /// Resolve display names for the client and project of a running activity timer
    async fn resolve_labels(&self, form: Option<&Value>) {
        let client = match form_id(form, SELECTED_CLIENT) {
            Some(id) => Some(self.resource_label(ResourceKind::Client, id).await),
            None => None,
        };
        let project = match form_id(form, SELECTED_PROJECT) {
            Some(id) => Some(self.resource_label(ResourceKind::Project, id).await),
            None => None,
        };
        if client.is_none() && project.is_none() {
            return;
        }
        if let Err(e) = self.state.merge_labels(client, project) {
            error!("Failed to store labels: {}", e);
        }
    }

    /// Display name of a resource, falling back to a placeholder on any failure
    pub async fn resource_label(&self, kind: ResourceKind, id: u64) -> String {
        match self.backend.resource_name(kind, id).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!("{} {} has no name field", kind.uri_key(), id);
                kind.fallback_label(id)
            }
            Err(e) => {
                warn!("Failed to look up {} {}: {}", kind.uri_key(), id, e);
                kind.fallback_label(id)
            }
        }
    }

    /// React to a host timer event that already went through the debounce
    pub async fn handle_host_event(&self, event: &HostEvent) {
        let for_activity = event
            .payload
            .timer_name
            .as_deref()
            .map_or(true, |name| name == ACTIVITY_TIMER);
        if event.name == TIMER_STARTED && for_activity {
            let payload = &event.payload;
            if let Err(e) = self
                .state
                .merge_labels(payload.client_name.clone(), payload.project_name.clone())
            {
                error!("Failed to store labels: {}", e);
            }
        }

        match event.payload.timer_name.as_deref() {
            Some(name) if self.is_tracked(name) => {
                self.check(name).await;
            }
            _ => self.check_all().await,
        }
    }

    /// Stop a running timer on the backend (clock-out)
    pub async fn stop_timer(&self, name: &str) -> Result<()> {
        let timer = self
            .state
            .timer(name)?
            .filter(|t| t.is_running)
            .ok_or_else(|| WidgetError::TimerNotRunning(name.to_string()))?;
        let elapsed = timer.elapsed_at(Instant::now());

        match self.backend.store_timer(name, elapsed, timer.form.as_ref()).await {
            Ok(()) => {
                info!("Timer {} stopped at {}", name, format_elapsed(elapsed));
                self.notifier
                    .success(&format!("Timer stopped after {}", format_elapsed(elapsed)));
                self.check(name).await;
                self.bus.emit(TIMER_STOPPED, EventPayload::for_timer(name));
                Ok(())
            }
            Err(e) => {
                self.notifier.error(&format!("Failed to stop timer: {}", e));
                Err(e)
            }
        }
    }
}

/// Handle to a mounted widget
pub struct MountHandle {
    core: Arc<WidgetCore>,
    tasks: Vec<JoinHandle<()>>,
    subscription: Option<BridgeSubscription>,
}

/// Mount a widget: sync once, then keep it live until teardown
pub fn mount(config: WidgetConfig, deps: WidgetDeps) -> MountHandle {
    let core = WidgetCore::new(config, deps);
    info!("Mounting widget for timers {:?}", core.config().timers);

    let (subscription, events) = event_bridge::subscribe(core.bus());

    let sync_core = Arc::clone(&core);
    let tasks = vec![
        tokio::spawn(async move { sync_core.sync().await }),
        tokio::spawn(idle_poll_task(Arc::clone(&core))),
        tokio::spawn(elapsed_ticker_task(
            Arc::clone(core.state()),
            core.config().tick_interval,
        )),
        tokio::spawn(event_bridge_task(Arc::clone(&core), events)),
    ];

    MountHandle {
        core,
        tasks,
        subscription: Some(subscription),
    }
}

impl MountHandle {
    pub fn core(&self) -> &Arc<WidgetCore> {
        &self.core
    }

    pub fn snapshot(&self) -> Result<WidgetSnapshot> {
        self.core.snapshot()
    }

    /// Watch the widget's snapshots as they change
    pub fn subscribe(&self) -> watch::Receiver<WidgetSnapshot> {
        self.core.state().subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.core.state().is_mounted()
    }

    /// Re-sync after the host view becomes visible again
    pub async fn resync(&self) {
        if self.is_mounted() {
            self.core.sync().await;
        }
    }

    /// Release every interval and listener. Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe(self.core.bus());
        }
        self.core.state().unmount();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.core.countdown.stop();
        info!("Widget torn down");
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if self.is_mounted() {
            self.teardown();
        }
    }
}
