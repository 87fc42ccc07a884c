//! Utility functions module
//!
//! Display formatting and process signal handling.

pub mod elapsed;
pub mod signals;

// Re-export main functions
pub use elapsed::{format_elapsed, parse_elapsed};
pub use signals::shutdown_signal;
