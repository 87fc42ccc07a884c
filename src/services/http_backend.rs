//! Backend implementation over the admin panel's HTTP API

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    error::{Result, WidgetError},
    services::backend::{extract_name_field, Backend, FilterOption, ResourceKind, TimerCheck},
    state::{IncidentQuery, IncidentRecord},
};

const STOPPED_MARKER: &str = "stopped";

#[derive(Debug, Deserialize)]
struct IncidentTable {
    #[serde(default)]
    rows: Vec<IncidentRecord>,
}

/// HTTP backend using reqwest
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a backend for the given base URL
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WidgetError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(request)
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WidgetError::from_status(status, body));
        }
        Ok(response)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        debug!("POST {}", path);
        let response = self.send(self.client.post(self.url(path)).json(body)).await?;
        response.json().await.map_err(WidgetError::from)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn check_timer(&self, timer_name: &str) -> Result<TimerCheck> {
        self.post_json("/api/time-tracking/check", &json!({ "timerName": timer_name }))
            .await
    }

    async fn store_timer(
        &self,
        timer_name: &str,
        elapsed_seconds: u64,
        form: Option<&Value>,
    ) -> Result<()> {
        debug!("POST /api/time-tracking/store for {}", timer_name);
        let body = json!({
            "timerName": timer_name,
            "elapsedTime": elapsed_seconds,
            "form": form.cloned().unwrap_or(Value::Null),
        });
        let response = self
            .send(self.client.post(self.url("/api/time-tracking/store")).json(&body))
            .await?;
        let text = response.text().await?;

        // The endpoint answers with a bare JSON string, tolerate it unquoted too
        let marker = serde_json::from_str::<String>(&text).unwrap_or_else(|_| text.trim().to_string());
        if marker == STOPPED_MARKER {
            Ok(())
        } else {
            Err(WidgetError::UnexpectedResponse(text))
        }
    }

    async fn incidents(&self, query: &IncidentQuery) -> Result<Vec<IncidentRecord>> {
        let table: IncidentTable = self.post_json("/api/event/get_table", query).await?;
        Ok(table.rows)
    }

    async fn resource_name(&self, kind: ResourceKind, id: u64) -> Result<Option<String>> {
        let path = format!("/nova-api/{}/{}", kind.uri_key(), id);
        debug!("GET {}", path);
        let response = self.send(self.client.get(self.url(&path))).await?;
        let payload: Value = response.json().await?;
        Ok(extract_name_field(&payload))
    }

    async fn filter_options(
        &self,
        filter: &str,
        dependencies: &BTreeMap<String, String>,
    ) -> Result<Vec<FilterOption>> {
        self.post_json(
            "/api/filters/options",
            &json!({ "filter": filter, "dependencies": dependencies }),
        )
        .await
    }
}
