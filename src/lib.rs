//! Dashboard Timers - headless dashboard widgets for named timers
//!
//! This library keeps a local, drift-free view of backend-tracked timers
//! (activity and office time) and of the countdown of the incident paired
//! with the running activity timer. Widgets are mounted with an injected
//! backend, event bus and notifier, and torn down synchronously.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;
pub mod widget;

// Re-export commonly used types
pub use config::{Config, WidgetConfig};
pub use error::{Result, WidgetError};
pub use api::create_router;
pub use widget::{mount, MountHandle, WidgetCore, WidgetDeps};
pub use utils::signals::shutdown_signal;
