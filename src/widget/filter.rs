//! Select filter whose options depend on other filters' values

use std::{collections::BTreeMap, sync::Arc};

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::services::{
    bus::{FILTER_ACTIVE, FILTER_RESET},
    Backend, EventBus, EventPayload, FilterOption, HandlerId, HostEvent,
};

/// A select filter fed by the values of the filters it depends on
#[derive(Debug)]
pub struct DependentFilter {
    key: String,
    depends_on: Vec<String>,
    static_options: Vec<FilterOption>,
    /// `None` until a dependency first gets a value
    fetched: Option<Vec<FilterOption>>,
    dependency_values: BTreeMap<String, String>,
    selected: Option<String>,
    bus: EventBus,
}

impl DependentFilter {
    pub fn new(
        key: impl Into<String>,
        depends_on: Vec<String>,
        static_options: Vec<FilterOption>,
        bus: EventBus,
    ) -> Self {
        Self {
            key: key.into(),
            depends_on,
            static_options,
            fetched: None,
            dependency_values: BTreeMap::new(),
            selected: None,
            bus,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn depends_on(&self, filter: &str) -> bool {
        self.depends_on.iter().any(|d| d == filter)
    }

    /// Options currently offered
    pub fn options(&self) -> &[FilterOption] {
        self.fetched.as_deref().unwrap_or(&self.static_options)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Record a dependency value and refresh the options.
    ///
    /// Once every dependency is empty again the fetched options are cleared
    /// outright, the static options are not restored.
    pub async fn set_dependency(&mut self, backend: &dyn Backend, dependency: &str, value: Option<String>) {
        if !self.depends_on(dependency) {
            return;
        }
        match value.filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                self.dependency_values.insert(dependency.to_string(), value);
            }
            None => {
                self.dependency_values.remove(dependency);
            }
        }

        if self.dependency_values.is_empty() {
            if self.fetched.is_some() {
                debug!("All dependencies of {} cleared, dropping fetched options", self.key);
                self.fetched = Some(Vec::new());
                self.reset();
            }
            return;
        }

        match backend.filter_options(&self.key, &self.dependency_values).await {
            Ok(options) => {
                debug!("Fetched {} options for {}", options.len(), self.key);
                self.fetched = Some(options);
                let still_offered = self
                    .selected
                    .as_ref()
                    .map_or(true, |selected| self.options().iter().any(|o| &o.value == selected));
                if !still_offered {
                    self.reset();
                }
            }
            Err(e) => warn!("Failed to fetch options for {}, keeping previous: {}", self.key, e),
        }
    }

    /// Select an offered value and announce it
    pub fn select(&mut self, value: &str) -> bool {
        if !self.options().iter().any(|o| o.value == value) {
            warn!("Value {} is not an option of {}", value, self.key);
            return false;
        }
        self.selected = Some(value.to_string());
        self.bus.emit(
            FILTER_ACTIVE,
            EventPayload {
                filter: Some(self.key.clone()),
                value: Some(value.to_string()),
                ..Default::default()
            },
        );
        true
    }

    /// Clear the selection and announce it
    pub fn reset(&mut self) {
        if self.selected.take().is_some() {
            info!("Filter {} reset", self.key);
            self.bus.emit(
                FILTER_RESET,
                EventPayload {
                    filter: Some(self.key.clone()),
                    ..Default::default()
                },
            );
        }
    }
}

/// A filter attached to the bus, following its dependencies' events
pub struct FilterHandle {
    filter: Arc<Mutex<DependentFilter>>,
    bus: EventBus,
    handlers: Vec<(&'static str, HandlerId)>,
    task: Option<JoinHandle<()>>,
}

/// Subscribe a filter to `filter-active` / `filter-reset` of the filters it depends on
pub fn attach(filter: DependentFilter, backend: Arc<dyn Backend>) -> FilterHandle {
    let bus = filter.bus.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<HostEvent>();

    let handlers = [FILTER_ACTIVE, FILTER_RESET]
        .into_iter()
        .map(|event| {
            let tx = tx.clone();
            let id = bus.on(event, move |host_event| {
                if tx.send(host_event.clone()).is_err() {
                    debug!("Filter task closed, dropping {}", host_event.name);
                }
            });
            (event, id)
        })
        .collect();

    let filter = Arc::new(Mutex::new(filter));
    let task_filter = Arc::clone(&filter);
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(source) = event.payload.filter.clone() else {
                continue;
            };
            let value = if event.name == FILTER_ACTIVE { event.payload.value.clone() } else { None };
            let mut filter = task_filter.lock().await;
            filter.set_dependency(backend.as_ref(), &source, value).await;
        }
    });

    FilterHandle {
        filter,
        bus,
        handlers,
        task: Some(task),
    }
}

impl FilterHandle {
    pub fn filter(&self) -> Arc<Mutex<DependentFilter>> {
        Arc::clone(&self.filter)
    }

    /// Unsubscribe from the bus and stop processing events
    pub fn detach(&mut self) {
        for (event, id) in self.handlers.drain(..) {
            self.bus.off(event, id);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for FilterHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
