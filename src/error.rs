//! Error types for the widget core.

use thiserror::Error;

/// Widget core errors.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// Transport-level failure talking to the backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend answered successfully but with a payload we cannot use
    #[error("Unexpected backend response: {0}")]
    UnexpectedResponse(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stop requested for a timer that is not running locally
    #[error("Timer is not running: {0}")]
    TimerNotRunning(String),

    /// A state mutex was poisoned by a panicking holder
    #[error("Failed to lock {0} state")]
    StatePoisoned(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WidgetError {
    /// Check if this error came from the network rather than from the data.
    pub fn is_network_error(&self) -> bool {
        matches!(self, WidgetError::Http(_) | WidgetError::Status { .. })
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        WidgetError::Status {
            status,
            body: body.into(),
        }
    }
}

/// Result type for widget operations.
pub type Result<T> = std::result::Result<T, WidgetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_count_as_network_errors() {
        let err = WidgetError::from_status(503, "maintenance");
        assert!(err.is_network_error());
        assert_eq!(err.to_string(), "Backend returned 503: maintenance");
    }

    #[test]
    fn data_errors_are_not_network_errors() {
        assert!(!WidgetError::UnexpectedResponse("\"ok\"".into()).is_network_error());
        assert!(!WidgetError::TimerNotRunning("time_tracking".into()).is_network_error());
    }
}
