//! State management module
//!
//! Local caches of the backend's named timers and incidents, and the
//! countdown derived from them.

pub mod countdown;
pub mod incident;
pub mod timer_state;
pub mod widget_state;

// Re-export main types
pub use countdown::{Countdown, TickOutcome};
pub use incident::{IncidentFilters, IncidentQuery, IncidentRecord};
pub use timer_state::{TimerState, ACTIVITY_TIMER, OFFICE_TIMER};
pub use widget_state::{CountdownChange, Labels, Reconciled, TimerView, WidgetSnapshot, WidgetState};
