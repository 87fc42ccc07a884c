//! Shared test doubles for widget integration tests

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use dashboard_timers::{
    error::{Result, WidgetError},
    services::{Backend, EventBus, FilterOption, Notifier, ResourceKind, TimerCheck},
    state::{IncidentQuery, IncidentRecord},
    widget::WidgetDeps,
};
use serde_json::Value;

/// In-memory backend with scripted timer responses
#[derive(Default)]
pub struct FakeBackend {
    pub timers: Mutex<HashMap<String, TimerCheck>>,
    pub incidents: Mutex<Vec<IncidentRecord>>,
    pub names: Mutex<HashMap<(String, u64), String>>,
    pub check_calls: Mutex<HashMap<String, usize>>,
    pub stored: Mutex<Vec<(String, u64, Option<Value>)>>,
    pub fail_checks: AtomicBool,
    pub fail_store: AtomicBool,
    pub check_delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_timer(&self, name: &str, check: TimerCheck) {
        self.timers.lock().unwrap().insert(name.to_string(), check);
    }

    pub fn set_incidents(&self, rows: Vec<IncidentRecord>) {
        *self.incidents.lock().unwrap() = rows;
    }

    pub fn set_name(&self, kind: ResourceKind, id: u64, name: &str) {
        self.names
            .lock()
            .unwrap()
            .insert((kind.uri_key().to_string(), id), name.to_string());
    }

    pub fn checks(&self, name: &str) -> usize {
        self.check_calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn fail_checks(&self, fail: bool) {
        self.fail_checks.store(fail, Ordering::SeqCst);
    }

    pub fn delay_checks(&self, delay: Option<Duration>) {
        *self.check_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn check_timer(&self, timer_name: &str) -> Result<TimerCheck> {
        *self
            .check_calls
            .lock()
            .unwrap()
            .entry(timer_name.to_string())
            .or_default() += 1;

        // Snapshot the response at request time, deliver it after the delay
        let response = self.timers.lock().unwrap().get(timer_name).cloned().unwrap_or_default();
        let delay = *self.check_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_checks.load(Ordering::SeqCst) {
            return Err(WidgetError::from_status(503, "unavailable"));
        }
        Ok(response)
    }

    async fn store_timer(&self, timer_name: &str, elapsed_seconds: u64, form: Option<&Value>) -> Result<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(WidgetError::UnexpectedResponse("\"error\"".to_string()));
        }
        self.stored
            .lock()
            .unwrap()
            .push((timer_name.to_string(), elapsed_seconds, form.cloned()));
        self.timers
            .lock()
            .unwrap()
            .insert(timer_name.to_string(), TimerCheck::stopped());
        Ok(())
    }

    async fn incidents(&self, _query: &IncidentQuery) -> Result<Vec<IncidentRecord>> {
        Ok(self.incidents.lock().unwrap().clone())
    }

    async fn resource_name(&self, kind: ResourceKind, id: u64) -> Result<Option<String>> {
        match self.names.lock().unwrap().get(&(kind.uri_key().to_string(), id)) {
            Some(name) => Ok(Some(name.clone())),
            None => Err(WidgetError::from_status(404, "not found")),
        }
    }

    async fn filter_options(&self, _filter: &str, _dependencies: &BTreeMap<String, String>) -> Result<Vec<FilterOption>> {
        Ok(Vec::new())
    }
}

/// Notifier that records toasts
#[derive(Default)]
pub struct RecordingNotifier {
    pub successes: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

pub fn incident(id: u64, seconds_remaining: i64) -> IncidentRecord {
    IncidentRecord {
        id,
        description: Some(format!("Incident {}", id)),
        created_at: None,
        starts_at: None,
        ends_at: None,
        seconds_remaining: Some(seconds_remaining),
    }
}

pub fn deps(backend: &Arc<FakeBackend>, bus: &EventBus, notifier: &Arc<RecordingNotifier>) -> WidgetDeps {
    WidgetDeps {
        backend: Arc::clone(backend) as Arc<dyn Backend>,
        bus: bus.clone(),
        notifier: Arc::clone(notifier) as Arc<dyn Notifier>,
    }
}
