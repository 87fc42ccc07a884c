//! Backend contract consumed by the widgets
//!
//! The backend owns every named timer record. Widgets only ever hold a cache
//! of what these calls return.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Result, state::{IncidentQuery, IncidentRecord}};

/// Largest elapsed time accepted from the backend, one hundred years
pub const MAX_ELAPSED_SECONDS: u64 = 100 * 366 * 24 * 3600;

/// Response of `POST /api/time-tracking/check`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerCheck {
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Value>,
}

impl TimerCheck {
    /// A response for a timer the backend reports as stopped
    pub fn stopped() -> Self {
        Self::default()
    }

    /// A response for a running timer
    pub fn running(elapsed_seconds: u64, form: Option<Value>) -> Self {
        Self {
            elapsed_time: elapsed_seconds as f64,
            form,
        }
    }

    /// Elapsed whole seconds if the timer is running, `None` if it is not.
    ///
    /// A timer counts as running when it has accumulated time or still carries
    /// the form it was started with. Elapsed time is capped at
    /// [`MAX_ELAPSED_SECONDS`].
    pub fn running_elapsed(&self) -> Option<u64> {
        let elapsed = if self.elapsed_time.is_finite() && self.elapsed_time > 0.0 {
            (self.elapsed_time.floor() as u64).min(MAX_ELAPSED_SECONDS)
        } else if self.elapsed_time == f64::INFINITY {
            MAX_ELAPSED_SECONDS
        } else {
            0
        };
        let has_form = matches!(&self.form, Some(form) if !form.is_null());
        (elapsed > 0 || has_form).then_some(elapsed)
    }
}

/// Nova resources the widgets resolve display names for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Client,
    Project,
}

impl ResourceKind {
    /// URI key of the resource in the admin API
    pub fn uri_key(&self) -> &'static str {
        match self {
            ResourceKind::Client => "clients",
            ResourceKind::Project => "projects",
        }
    }

    /// Label used when the real name cannot be resolved
    pub fn fallback_label(&self, id: u64) -> String {
        match self {
            ResourceKind::Client => format!("Client #{}", id),
            ResourceKind::Project => format!("Project #{}", id),
        }
    }
}

/// One selectable option of the dependent filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

impl FilterOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Everything the widgets need from the backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask whether a named timer is running and for how long
    async fn check_timer(&self, timer_name: &str) -> Result<TimerCheck>;

    /// Persist and stop a named timer
    async fn store_timer(
        &self,
        timer_name: &str,
        elapsed_seconds: u64,
        form: Option<&Value>,
    ) -> Result<()>;

    /// Fetch one page of incidents
    async fn incidents(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>>;

    /// Look up the display name of a resource, `None` when it has no name field
    async fn resource_name(&self, kind: ResourceKind, id: u64) -> Result<Option<String>>;

    /// Options of a dependent filter for the given dependency values
    async fn filter_options(
        &self,
        filter: &str,
        dependencies: &BTreeMap<String, String>,
    ) -> Result<Vec<FilterOption>>;
}

/// Pull the `name` field out of a resource payload.
///
/// Accepts both `{resource: {fields: [...]}}` and a bare `{fields: [...]}`.
pub fn extract_name_field(payload: &Value) -> Option<String> {
    let fields = payload
        .pointer("/resource/fields")
        .or_else(|| payload.get("fields"))?
        .as_array()?;

    fields
        .iter()
        .find(|field| field.get("attribute").and_then(Value::as_str) == Some("name"))
        .and_then(|field| field.get("value"))
        .and_then(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Read a numeric id out of a form field that may be a number or a numeric string
pub fn form_id(form: Option<&Value>, key: &str) -> Option<u64> {
    match form?.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
