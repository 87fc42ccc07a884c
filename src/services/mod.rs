//! External collaborator module
//!
//! The backend API, the host event bus and the host notification surface.
//! Widgets receive all three explicitly at mount time.

pub mod backend;
pub mod bus;
pub mod http_backend;
pub mod notifier;

// Re-export main types
pub use backend::{Backend, FilterOption, ResourceKind, TimerCheck};
pub use bus::{EventBus, EventPayload, HandlerId, HostEvent};
pub use http_backend::HttpBackend;
pub use notifier::{LogNotifier, Notifier};
