//! User-facing notifications for explicit actions

use tracing::{error, info};

/// Toast surface provided by the host
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that only writes to the log, used when no host UI is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        info!(toast = "success", "{}", message);
    }

    fn error(&self, message: &str) {
        error!(toast = "error", "{}", message);
    }
}
