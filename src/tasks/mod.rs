//! Background tasks module
//!
//! Tasks spawned by a mounted widget. All of them are aborted on teardown.

pub mod countdown_ticker;
pub mod elapsed_ticker;
pub mod event_bridge;
pub mod idle_poll;

// Re-export main functions
pub use countdown_ticker::CountdownTicker;
pub use elapsed_ticker::elapsed_ticker_task;
pub use event_bridge::{event_bridge_task, BridgeSubscription};
pub use idle_poll::idle_poll_task;
