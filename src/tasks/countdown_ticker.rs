//! Interval driver for the incident countdown

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::state::{TickOutcome, WidgetState};

/// Owns the single countdown interval of a widget
#[derive(Debug, Default)]
pub struct CountdownTicker {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CountdownTicker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.handle.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace any running interval with a fresh one
    pub fn restart(&self, state: Arc<WidgetState>, period: Duration) {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
            debug!("Cleared previous countdown interval");
        }
        // Checked under the slot lock, a concurrent check may have cleared it
        if !needs_ticker(&state) {
            return;
        }
        *slot = Some(tokio::spawn(countdown_task(state, period)));
    }

    /// Bring the interval in line with the countdown currently stored.
    ///
    /// Stops the interval when no live countdown remains, and keeps or starts
    /// one when a concurrent check installed a countdown in the meantime.
    pub fn settle(&self, state: Arc<WidgetState>, period: Duration) {
        let mut slot = self.slot();
        if needs_ticker(&state) {
            if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
                return;
            }
            debug!("Live countdown without interval, starting one");
            *slot = Some(tokio::spawn(countdown_task(state, period)));
        } else if let Some(handle) = slot.take() {
            handle.abort();
            debug!("Countdown interval stopped");
        }
    }

    /// Stop the interval if one is installed
    pub fn stop(&self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
            debug!("Countdown interval stopped");
        }
    }

    /// Whether an interval is still ticking
    pub fn is_active(&self) -> bool {
        self.slot().as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

fn needs_ticker(state: &WidgetState) -> bool {
    state.is_mounted() && matches!(state.countdown(), Ok(Some(countdown)) if !countdown.completed)
}

async fn countdown_task(state: Arc<WidgetState>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if !state.is_mounted() {
            break;
        }
        match state.tick_countdown(Instant::now()) {
            Ok(TickOutcome::Running(remaining)) => debug!("Countdown: {}s remaining", remaining),
            Ok(TickOutcome::Completed) => {
                info!("Incident countdown completed");
                break;
            }
            Ok(TickOutcome::Idle) => break,
            Err(e) => {
                error!("Failed to tick countdown: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::TimerCheck,
        state::{IncidentRecord, ACTIVITY_TIMER, OFFICE_TIMER},
    };
    use chrono::Utc;
    use serde_json::json;

    const PERIOD: Duration = Duration::from_secs(1);

    fn widget_state() -> Arc<WidgetState> {
        let state = Arc::new(WidgetState::new(&[ACTIVITY_TIMER.to_string(), OFFICE_TIMER.to_string()]));
        let incident = IncidentRecord {
            id: 7,
            description: None,
            created_at: None,
            starts_at: None,
            ends_at: None,
            seconds_remaining: Some(100),
        };
        state.set_incidents(vec![incident], Instant::now()).unwrap();
        state
    }

    fn run_incident(state: &WidgetState) {
        let check = TimerCheck::running(30, Some(json!({"selectedIncident": 7})));
        state.apply_check(ACTIVITY_TIMER, &check, Instant::now(), Utc::now()).unwrap();
    }

    fn stop_activity(state: &WidgetState) {
        state
            .apply_check(ACTIVITY_TIMER, &TimerCheck::stopped(), Instant::now(), Utc::now())
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn late_clear_keeps_the_interval_of_a_live_countdown() {
        let state = widget_state();
        let ticker = CountdownTicker::new();

        // A check that cleared the countdown applies its change after a newer check restarted it
        stop_activity(&state);
        run_incident(&state);
        ticker.restart(Arc::clone(&state), PERIOD);
        ticker.settle(Arc::clone(&state), PERIOD);

        assert!(ticker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn late_restart_does_not_tick_a_cleared_countdown() {
        let state = widget_state();
        let ticker = CountdownTicker::new();

        run_incident(&state);
        stop_activity(&state);
        ticker.settle(Arc::clone(&state), PERIOD);
        ticker.restart(Arc::clone(&state), PERIOD);

        assert!(!ticker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_starts_a_missing_interval() {
        let state = widget_state();
        let ticker = CountdownTicker::new();

        run_incident(&state);
        ticker.settle(Arc::clone(&state), PERIOD);
        assert!(ticker.is_active());

        tokio::time::sleep(Duration::from_millis(70_500)).await;
        assert!(!ticker.is_active());
        assert!(state.snapshot().unwrap().countdown_completed);
    }
}
