//! Per-widget state shared between the poller, tickers and event bridge

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info, warn};

use super::{Countdown, IncidentRecord, TickOutcome, TimerState, ACTIVITY_TIMER};
use crate::{
    error::{Result, WidgetError},
    services::{backend::form_id, TimerCheck},
    utils::format_elapsed,
};

/// Form field holding the incident an activity timer was started for
pub const SELECTED_INCIDENT: &str = "selectedIncident";

/// Display labels of the running activity timer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    pub client_name: Option<String>,
    pub project_name: Option<String>,
}

/// What a reconciliation did to the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownChange {
    /// A new countdown was installed and needs a ticker
    Started,
    /// Nothing to do
    Unchanged,
    /// The countdown was removed and its ticker must stop
    Cleared,
    /// A countdown was installed already at zero, no ticker is needed
    Expired,
}

/// Outcome of applying one backend check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// The widget was already torn down and the response was ignored
    pub discarded: bool,
    /// The timer state differs from before
    pub changed: bool,
    /// Any tracked timer is running after this reconciliation
    pub any_running: bool,
    pub countdown: CountdownChange,
}

/// Serializable view of one timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerView {
    pub name: String,
    pub is_running: bool,
    pub elapsed_seconds: u64,
    pub elapsed: String,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&TimerState> for TimerView {
    fn from(timer: &TimerState) -> Self {
        Self {
            name: timer.name.clone(),
            is_running: timer.is_running,
            elapsed_seconds: timer.elapsed_seconds,
            elapsed: timer.formatted(),
            started_at: timer.started_at,
        }
    }
}

/// Everything a render needs, taken at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    pub timers: Vec<TimerView>,
    pub active_incident_id: Option<u64>,
    pub incident_countdown: Option<u64>,
    pub incident_countdown_display: Option<String>,
    pub countdown_completed: bool,
    pub incident_count: usize,
    pub client_name: Option<String>,
    pub project_name: Option<String>,
    pub idle_polling: bool,
    pub mounted: bool,
}

impl WidgetSnapshot {
    pub fn timer(&self, name: &str) -> Option<&TimerView> {
        self.timers.iter().find(|t| t.name == name)
    }

    pub fn any_running(&self) -> bool {
        self.timers.iter().any(|t| t.is_running)
    }
}

/// State of one mounted widget
#[derive(Debug)]
pub struct WidgetState {
    timers: Mutex<Vec<TimerState>>,
    incidents: Mutex<Vec<IncidentRecord>>,
    countdown: Mutex<Option<Countdown>>,
    labels: Mutex<Labels>,
    mounted: AtomicBool,
    /// Whether any tracked timer is running, drives idle polling and ticking
    running_tx: watch::Sender<bool>,
    snapshot_tx: watch::Sender<WidgetSnapshot>,
}

impl WidgetState {
    /// Create a mounted state with every tracked timer stopped
    pub fn new(tracked: &[String]) -> Self {
        let timers: Vec<TimerState> = tracked.iter().map(TimerState::new).collect();
        let (running_tx, _) = watch::channel(false);
        let (snapshot_tx, _) = watch::channel(WidgetSnapshot::default());

        let state = Self {
            timers: Mutex::new(timers),
            incidents: Mutex::new(Vec::new()),
            countdown: Mutex::new(None),
            labels: Mutex::new(Labels::default()),
            mounted: AtomicBool::new(true),
            running_tx,
            snapshot_tx,
        };
        state.publish();
        state
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Mark the widget torn down, later results are ignored
    pub fn unmount(&self) {
        if self.mounted.swap(false, Ordering::SeqCst) {
            info!("Widget state unmounted");
            self.publish();
        }
    }

    pub fn any_running(&self) -> bool {
        *self.running_tx.borrow()
    }

    /// Idle polling is due only while mounted and no tracked timer runs
    pub fn idle_polling(&self) -> bool {
        self.is_mounted() && !self.any_running()
    }

    pub fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.running_tx.subscribe()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Names of the tracked timers in display order
    pub fn timer_names(&self) -> Result<Vec<String>> {
        let timers = self.timers.lock().map_err(|_| WidgetError::StatePoisoned("timer"))?;
        Ok(timers.iter().map(|t| t.name.clone()).collect())
    }

    pub fn timer(&self, name: &str) -> Result<Option<TimerState>> {
        let timers = self.timers.lock().map_err(|_| WidgetError::StatePoisoned("timer"))?;
        Ok(timers.iter().find(|t| t.name == name).cloned())
    }

    /// Replace a timer's state with what the backend reported.
    ///
    /// Reconciliation is wholesale, so applying the same response twice
    /// leaves the state as it was after the first.
    pub fn apply_check(
        &self,
        name: &str,
        check: &TimerCheck,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Result<Reconciled> {
        if !self.is_mounted() {
            debug!("Discarding check for {} after teardown", name);
            return Ok(Reconciled {
                discarded: true,
                changed: false,
                any_running: self.any_running(),
                countdown: CountdownChange::Unchanged,
            });
        }

        let incoming = TimerState::from_check(name, check, now, wall);
        let mut timers = self.timers.lock().map_err(|_| WidgetError::StatePoisoned("timer"))?;

        let changed = match timers.iter_mut().find(|t| t.name == name) {
            Some(existing) if existing.matches(&incoming, now) => {
                existing.refresh(now);
                false
            }
            Some(existing) => {
                if existing.is_running != incoming.is_running {
                    info!(
                        "Timer {} is now {}",
                        name,
                        if incoming.is_running { "running" } else { "stopped" }
                    );
                }
                *existing = incoming;
                true
            }
            None => {
                warn!("Check result for untracked timer {}, tracking it", name);
                timers.push(incoming);
                true
            }
        };
        let any_running = timers.iter().any(|t| t.is_running);
        let activity_stopped = timers
            .iter()
            .find(|t| t.name == ACTIVITY_TIMER)
            .map_or(true, |t| !t.is_running);
        drop(timers); // Release the lock early

        self.running_tx.send_if_modified(|running| {
            let modified = *running != any_running;
            *running = any_running;
            modified
        });

        if name == ACTIVITY_TIMER && activity_stopped {
            let mut labels = self.labels.lock().map_err(|_| WidgetError::StatePoisoned("label"))?;
            *labels = Labels::default();
        }

        let countdown = if name == ACTIVITY_TIMER {
            self.reconcile_countdown(now)?
        } else {
            CountdownChange::Unchanged
        };

        self.publish();
        Ok(Reconciled {
            discarded: false,
            changed,
            any_running,
            countdown,
        })
    }

    /// Replace the incident batch and re-pair the countdown
    pub fn set_incidents(&self, rows: Vec<IncidentRecord>, now: Instant) -> Result<CountdownChange> {
        if !self.is_mounted() {
            debug!("Discarding {} incidents after teardown", rows.len());
            return Ok(CountdownChange::Unchanged);
        }
        {
            let mut incidents = self.incidents.lock().map_err(|_| WidgetError::StatePoisoned("incident"))?;
            *incidents = rows;
        }
        let change = self.reconcile_countdown(now)?;
        self.publish();
        Ok(change)
    }

    /// Pair the running activity timer with its incident, if any
    fn reconcile_countdown(&self, now: Instant) -> Result<CountdownChange> {
        let selection = {
            let timers = self.timers.lock().map_err(|_| WidgetError::StatePoisoned("timer"))?;
            timers
                .iter()
                .find(|t| t.name == ACTIVITY_TIMER && t.is_running)
                .and_then(|t| form_id(t.form.as_ref(), SELECTED_INCIDENT).map(|id| (id, t.elapsed_at(now))))
        };

        let target = match selection {
            Some((id, elapsed)) => {
                let incidents = self.incidents.lock().map_err(|_| WidgetError::StatePoisoned("incident"))?;
                incidents
                    .iter()
                    .find(|i| i.id == id)
                    .and_then(IncidentRecord::remaining)
                    .map(|remaining| (id, remaining.saturating_sub(elapsed)))
            }
            None => None,
        };

        let mut countdown = self.countdown.lock().map_err(|_| WidgetError::StatePoisoned("countdown"))?;
        let change = match (target, countdown.as_ref()) {
            (None, None) => CountdownChange::Unchanged,
            (None, Some(existing)) => {
                info!("Clearing countdown for incident {}", existing.incident_id);
                *countdown = None;
                CountdownChange::Cleared
            }
            (Some((id, initial)), Some(existing))
                if existing.incident_id == id && existing.remaining_at(now) == initial =>
            {
                CountdownChange::Unchanged
            }
            (Some((id, 0)), _) => {
                info!("Incident {} has no time left", id);
                *countdown = Some(Countdown::start(id, 0, now));
                CountdownChange::Expired
            }
            (Some((id, initial)), _) => {
                info!("Starting countdown for incident {} at {}s", id, initial);
                *countdown = Some(Countdown::start(id, initial, now));
                CountdownChange::Started
            }
        };
        Ok(change)
    }

    /// Drop the countdown regardless of the timer pairing
    pub fn reset_countdown(&self) -> Result<bool> {
        let cleared = {
            let mut countdown = self.countdown.lock().map_err(|_| WidgetError::StatePoisoned("countdown"))?;
            countdown.take().is_some()
        };
        if cleared {
            self.publish();
        }
        Ok(cleared)
    }

    pub fn countdown(&self) -> Result<Option<Countdown>> {
        let countdown = self.countdown.lock().map_err(|_| WidgetError::StatePoisoned("countdown"))?;
        Ok(countdown.clone())
    }

    /// Advance the countdown to `now`
    pub fn tick_countdown(&self, now: Instant) -> Result<TickOutcome> {
        let outcome = {
            let mut countdown = self.countdown.lock().map_err(|_| WidgetError::StatePoisoned("countdown"))?;
            match countdown.as_mut() {
                Some(countdown) => countdown.tick(now),
                None => TickOutcome::Idle,
            }
        };
        if outcome != TickOutcome::Idle {
            self.publish();
        }
        Ok(outcome)
    }

    /// Recompute elapsed time of every running timer, returns true if any changed
    pub fn refresh_timers(&self, now: Instant) -> Result<bool> {
        let changed = {
            let mut timers = self.timers.lock().map_err(|_| WidgetError::StatePoisoned("timer"))?;
            timers.iter_mut().fold(false, |acc, t| t.refresh(now) || acc)
        };
        if changed {
            self.publish();
        }
        Ok(changed)
    }

    /// Overwrite the labels that are present, keep the others
    pub fn merge_labels(&self, client_name: Option<String>, project_name: Option<String>) -> Result<()> {
        if !self.is_mounted() {
            return Ok(());
        }
        {
            let mut labels = self.labels.lock().map_err(|_| WidgetError::StatePoisoned("label"))?;
            if client_name.is_some() {
                labels.client_name = client_name;
            }
            if project_name.is_some() {
                labels.project_name = project_name;
            }
        }
        self.publish();
        Ok(())
    }

    pub fn labels(&self) -> Result<Labels> {
        let labels = self.labels.lock().map_err(|_| WidgetError::StatePoisoned("label"))?;
        Ok(labels.clone())
    }

    pub fn incident_count(&self) -> Result<usize> {
        let incidents = self.incidents.lock().map_err(|_| WidgetError::StatePoisoned("incident"))?;
        Ok(incidents.len())
    }

    /// Build a snapshot of the current state
    pub fn snapshot(&self) -> Result<WidgetSnapshot> {
        let timers: Vec<TimerView> = {
            let timers = self.timers.lock().map_err(|_| WidgetError::StatePoisoned("timer"))?;
            timers.iter().map(TimerView::from).collect()
        };
        let countdown = self.countdown()?;
        let labels = self.labels()?;

        Ok(WidgetSnapshot {
            timers,
            active_incident_id: countdown.as_ref().map(|c| c.incident_id),
            incident_countdown: countdown.as_ref().map(|c| c.remaining),
            incident_countdown_display: countdown.as_ref().map(|c| format_elapsed(c.remaining)),
            countdown_completed: countdown.as_ref().is_some_and(|c| c.completed),
            incident_count: self.incident_count()?,
            client_name: labels.client_name,
            project_name: labels.project_name,
            idle_polling: self.idle_polling(),
            mounted: self.is_mounted(),
        })
    }

    // Push the latest snapshot to watchers
    fn publish(&self) {
        match self.snapshot() {
            Ok(snapshot) => {
                self.snapshot_tx.send_replace(snapshot);
            }
            Err(e) => warn!("Failed to publish widget snapshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OFFICE_TIMER;
    use serde_json::json;
    use std::time::Duration;

    fn tracked() -> Vec<String> {
        vec![ACTIVITY_TIMER.to_string(), OFFICE_TIMER.to_string()]
    }

    fn incident(id: u64, seconds_remaining: i64) -> IncidentRecord {
        IncidentRecord {
            id,
            description: Some(format!("Incident {}", id)),
            created_at: None,
            starts_at: None,
            ends_at: None,
            seconds_remaining: Some(seconds_remaining),
        }
    }

    #[test]
    fn starts_with_every_timer_stopped_and_idle_polling() {
        let state = WidgetState::new(&tracked());
        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.timers.len(), 2);
        assert!(!snapshot.any_running());
        assert!(snapshot.idle_polling);
        assert_eq!(snapshot.incident_countdown, None);
    }

    #[test]
    fn exhausted_incident_is_completed_at_once() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        state.set_incidents(vec![incident(7, 20)], now).unwrap();

        let check = TimerCheck::running(30, Some(json!({"selectedIncident": 7})));
        let reconciled = state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        assert_eq!(reconciled.countdown, CountdownChange::Expired);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.active_incident_id, Some(7));
        assert_eq!(snapshot.incident_countdown, Some(0));
        assert!(snapshot.countdown_completed);

        let again = state.apply_check(ACTIVITY_TIMER, &check, now + Duration::from_secs(3), Utc::now()).unwrap();
        assert_eq!(again.countdown, CountdownChange::Unchanged);
    }

    #[test]
    fn incident_countdown_starts_from_remaining_minus_elapsed() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        state.set_incidents(vec![incident(3, 500), incident(7, 100)], now).unwrap();

        let check = TimerCheck::running(30, Some(json!({"selectedIncident": 7})));
        let reconciled = state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        assert_eq!(reconciled.countdown, CountdownChange::Started);
        assert!(reconciled.any_running);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.active_incident_id, Some(7));
        assert_eq!(snapshot.incident_countdown, Some(70));
        assert_eq!(snapshot.incident_countdown_display.as_deref(), Some("00:01:10"));
        assert!(!snapshot.idle_polling);

        for n in 1..70 {
            assert_eq!(
                state.tick_countdown(now + Duration::from_secs(n)).unwrap(),
                TickOutcome::Running(70 - n)
            );
        }
        assert_eq!(state.tick_countdown(now + Duration::from_secs(70)).unwrap(), TickOutcome::Completed);
        let snapshot = state.snapshot().unwrap();
        assert!(snapshot.countdown_completed);
        assert_eq!(snapshot.incident_countdown, Some(0));
    }

    #[test]
    fn identical_checks_are_idempotent() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        state.set_incidents(vec![incident(7, 100)], now).unwrap();
        let check = TimerCheck::running(30, Some(json!({"selectedIncident": "7"})));

        let first = state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        let after_first = (state.timer(ACTIVITY_TIMER).unwrap(), state.countdown().unwrap());
        let second = state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        let after_second = (state.timer(ACTIVITY_TIMER).unwrap(), state.countdown().unwrap());

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.countdown, CountdownChange::Unchanged);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn office_stop_resumes_idle_polling_only_when_activity_stopped() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        state.apply_check(OFFICE_TIMER, &TimerCheck::running(600, None), now, Utc::now()).unwrap();
        state.apply_check(ACTIVITY_TIMER, &TimerCheck::running(60, None), now, Utc::now()).unwrap();
        assert!(!state.idle_polling());

        state.apply_check(OFFICE_TIMER, &TimerCheck::stopped(), now, Utc::now()).unwrap();
        let office = state.timer(OFFICE_TIMER).unwrap().unwrap();
        assert!(!office.is_running);
        assert_eq!(office.elapsed_seconds, 0);
        assert_eq!(office.started_at, None);
        assert!(!state.idle_polling(), "activity timer still running");

        state.apply_check(ACTIVITY_TIMER, &TimerCheck::stopped(), now, Utc::now()).unwrap();
        assert!(state.idle_polling());
    }

    #[test]
    fn missing_incident_leaves_countdown_inactive() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        state.set_incidents(vec![incident(1, 100)], now).unwrap();
        let check = TimerCheck::running(5, Some(json!({"selectedIncident": 42})));
        let reconciled = state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        assert_eq!(reconciled.countdown, CountdownChange::Unchanged);
        assert_eq!(state.snapshot().unwrap().active_incident_id, None);
    }

    #[test]
    fn incidents_arriving_after_check_start_the_countdown() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        let check = TimerCheck::running(30, Some(json!({"selectedIncident": 7})));
        state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        assert_eq!(state.countdown().unwrap(), None);

        let later = now + Duration::from_secs(10);
        let change = state.set_incidents(vec![incident(7, 100)], later).unwrap();
        assert_eq!(change, CountdownChange::Started);
        assert_eq!(state.countdown().unwrap().unwrap().remaining, 60);
    }

    #[test]
    fn stopping_activity_clears_countdown_and_labels() {
        let state = WidgetState::new(&tracked());
        let now = Instant::now();
        state.set_incidents(vec![incident(7, 100)], now).unwrap();
        let check = TimerCheck::running(30, Some(json!({"selectedIncident": 7})));
        state.apply_check(ACTIVITY_TIMER, &check, now, Utc::now()).unwrap();
        state.merge_labels(Some("Acme".into()), None).unwrap();

        let reconciled = state.apply_check(ACTIVITY_TIMER, &TimerCheck::stopped(), now, Utc::now()).unwrap();
        assert_eq!(reconciled.countdown, CountdownChange::Cleared);
        assert_eq!(state.labels().unwrap(), Labels::default());
        assert_eq!(state.tick_countdown(now).unwrap(), TickOutcome::Idle);
    }

    #[test]
    fn responses_after_unmount_are_ignored() {
        let state = WidgetState::new(&tracked());
        state.unmount();
        let reconciled = state
            .apply_check(ACTIVITY_TIMER, &TimerCheck::running(30, None), Instant::now(), Utc::now())
            .unwrap();
        assert!(reconciled.discarded);
        assert!(!state.timer(ACTIVITY_TIMER).unwrap().unwrap().is_running);
        assert!(!state.idle_polling());
    }

    #[test]
    fn watchers_see_running_transitions() {
        let state = WidgetState::new(&tracked());
        let mut running_rx = state.subscribe_running();
        assert!(!*running_rx.borrow_and_update());

        state
            .apply_check(OFFICE_TIMER, &TimerCheck::running(1, None), Instant::now(), Utc::now())
            .unwrap();
        assert!(running_rx.has_changed().unwrap());
        assert!(*running_rx.borrow_and_update());

        // Same running set again does not notify
        state
            .apply_check(OFFICE_TIMER, &TimerCheck::running(1, None), Instant::now(), Utc::now())
            .unwrap();
        assert!(!running_rx.has_changed().unwrap());
    }
}
