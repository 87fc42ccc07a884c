//! Incident records and the table query that fetches them

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Incident as returned by the event table endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub seconds_remaining: Option<i64>,
}

impl IncidentRecord {
    /// Seconds left on the incident, negative values clamp to zero
    pub fn remaining(&self) -> Option<u64> {
        self.seconds_remaining.map(|s| s.max(0) as u64)
    }
}

/// Column filters of the event table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentFilters {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `POST /api/event/get_table`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentQuery {
    pub limit: u32,
    pub page: u32,
    pub sort_column: String,
    pub sort_order: String,
    pub filters: IncidentFilters,
    pub date_range: [String; 2],
}

impl IncidentQuery {
    /// First page of incidents of `kind` for a single day
    pub fn for_day(day: NaiveDate, kind: &str, limit: u32) -> Self {
        let date = day.format("%Y-%m-%d").to_string();
        Self {
            limit,
            page: 1,
            sort_column: "starts_at".to_string(),
            sort_order: "asc".to_string(),
            filters: IncidentFilters {
                kind: kind.to_string(),
            },
            date_range: [date.clone(), date],
        }
    }
}
