//! Configuration and CLI argument handling

use std::time::Duration;

use clap::Parser;

use crate::state::{ACTIVITY_TIMER, OFFICE_TIMER};

/// Settings of a mounted widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Named timers to watch, in display order
    pub timers: Vec<String>,
    /// Idle polling period while no timer runs
    pub poll_interval: Duration,
    /// Delay between a host event and the re-check it triggers
    pub event_debounce: Duration,
    /// Display refresh period of running timers and the countdown
    pub tick_interval: Duration,
    /// Incident page size
    pub incident_limit: u32,
    /// Incident type filter
    pub incident_type: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            timers: vec![ACTIVITY_TIMER.to_string(), OFFICE_TIMER.to_string()],
            poll_interval: Duration::from_secs(30),
            event_debounce: Duration::from_millis(500),
            tick_interval: Duration::from_secs(1),
            incident_limit: 100,
            incident_type: "incident".to_string(),
        }
    }
}

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "dashboard-timers")]
#[command(about = "Headless dashboard widgets for named timers and incident countdowns")]
#[command(version)]
pub struct Config {
    /// Base URL of the admin panel backend
    #[arg(short, long, env = "DASHBOARD_BACKEND_URL", default_value = "http://127.0.0.1:8000")]
    pub backend: String,

    /// Bearer token sent with every backend request
    #[arg(long, env = "DASHBOARD_TOKEN")]
    pub token: Option<String>,

    /// Port to bind the host shim to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Named timers to track
    #[arg(long = "timer", default_values_t = [ACTIVITY_TIMER.to_string(), OFFICE_TIMER.to_string()])]
    pub timers: Vec<String>,

    /// Idle polling interval in seconds
    #[arg(long, default_value = "30")]
    pub poll_interval: u64,

    /// Delay before re-checking after a host event, in milliseconds
    #[arg(long, default_value = "500")]
    pub debounce_ms: u64,

    /// Backend request timeout in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout: u64,

    /// Number of incidents fetched per reload
    #[arg(long, default_value = "100")]
    pub incident_limit: u32,

    /// Incident type filter
    #[arg(long, default_value = "incident")]
    pub incident_type: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Widget settings derived from the CLI
    pub fn widget_config(&self) -> WidgetConfig {
        WidgetConfig {
            timers: self.timers.clone(),
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            event_debounce: Duration::from_millis(self.debounce_ms),
            incident_limit: self.incident_limit,
            incident_type: self.incident_type.clone(),
            ..WidgetConfig::default()
        }
    }
}
