//! Named timer state and its reconciliation from backend snapshots

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::time::Instant;

use crate::{services::TimerCheck, utils::format_elapsed};

/// Activity timer, the one incidents are paired with
pub const ACTIVITY_TIMER: &str = "time_tracking";
/// Office presence timer
pub const OFFICE_TIMER: &str = "work_time_tracking";

/// Local cache of one named timer
#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    pub name: String,
    pub is_running: bool,
    pub elapsed_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Form the timer was started with, as stored by the backend
    pub form: Option<Value>,
    /// Monotonic instant of the last sync and the elapsed seconds reported then
    anchor: Option<(Instant, u64)>,
}

impl TimerState {
    /// Create a stopped timer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_running: false,
            elapsed_seconds: 0,
            started_at: None,
            form: None,
            anchor: None,
        }
    }

    /// Build the state a backend check describes, as seen at `now`
    pub fn from_check(name: &str, check: &TimerCheck, now: Instant, wall: DateTime<Utc>) -> Self {
        match check.running_elapsed() {
            Some(elapsed) => Self {
                name: name.to_string(),
                is_running: true,
                elapsed_seconds: elapsed,
                started_at: i64::try_from(elapsed)
                    .ok()
                    .and_then(ChronoDuration::try_seconds)
                    .and_then(|delta| wall.checked_sub_signed(delta)),
                form: check.form.clone().filter(|form| !form.is_null()),
                anchor: Some((now, elapsed)),
            },
            None => Self::new(name),
        }
    }

    /// Elapsed seconds at `now`, derived from the anchor
    pub fn elapsed_at(&self, now: Instant) -> u64 {
        match (self.is_running, self.anchor) {
            (true, Some((synced_at, base))) => {
                base.saturating_add(now.saturating_duration_since(synced_at).as_secs())
            }
            _ => 0,
        }
    }

    /// Recompute the displayed elapsed time, returns true if it changed
    pub fn refresh(&mut self, now: Instant) -> bool {
        let elapsed = self.elapsed_at(now);
        let changed = elapsed != self.elapsed_seconds;
        self.elapsed_seconds = elapsed;
        changed
    }

    /// Whether `other` describes the same server-side timer as this state at `now`
    pub fn matches(&self, other: &TimerState, now: Instant) -> bool {
        self.is_running == other.is_running
            && self.elapsed_at(now) == other.elapsed_seconds
            && self.form == other.form
    }

    /// `HH:MM:SS` rendering of the elapsed time
    pub fn formatted(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend::MAX_ELAPSED_SECONDS;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn stopped_check_keeps_invariants() {
        let state = TimerState::from_check(OFFICE_TIMER, &TimerCheck::stopped(), Instant::now(), Utc::now());
        assert!(!state.is_running);
        assert_eq!(state.elapsed_seconds, 0);
        assert_eq!(state.started_at, None);
        assert_eq!(state.form, None);
        assert_eq!(state.formatted(), "00:00:00");
    }

    #[test]
    fn running_check_back_dates_start() {
        let wall = Utc::now();
        let check = TimerCheck::running(90, Some(json!({"selectedIncident": 7})));
        let state = TimerState::from_check(ACTIVITY_TIMER, &check, Instant::now(), wall);
        assert!(state.is_running);
        assert_eq!(state.elapsed_seconds, 90);
        assert_eq!(state.started_at, Some(wall - ChronoDuration::seconds(90)));
        assert_eq!(state.formatted(), "00:01:30");
    }

    #[test]
    fn huge_elapsed_is_capped() {
        let wall = Utc::now();
        let now = Instant::now();
        for elapsed_time in [1.0e13, f64::MAX, f64::INFINITY] {
            let check = TimerCheck { elapsed_time, form: None };
            let state = TimerState::from_check(ACTIVITY_TIMER, &check, now, wall);
            assert!(state.is_running);
            assert_eq!(state.elapsed_seconds, MAX_ELAPSED_SECONDS);
            assert!(state.started_at.is_some_and(|started| started < wall));
            assert_eq!(state.elapsed_at(now + Duration::from_secs(60)), MAX_ELAPSED_SECONDS + 60);
        }
    }

    #[test]
    fn elapsed_saturates_instead_of_overflowing() {
        let now = Instant::now();
        let mut state = TimerState::from_check(OFFICE_TIMER, &TimerCheck::running(1, None), now, Utc::now());
        state.anchor = Some((now, u64::MAX));
        assert_eq!(state.elapsed_at(now + Duration::from_secs(5)), u64::MAX);
    }

    #[test]
    fn refresh_counts_from_the_anchor() {
        let now = Instant::now();
        let mut state = TimerState::from_check(ACTIVITY_TIMER, &TimerCheck::running(10, None), now, Utc::now());

        assert!(state.refresh(now + Duration::from_millis(2_500)));
        assert_eq!(state.elapsed_seconds, 12);
        // A late tick catches up instead of adding one second
        assert!(state.refresh(now + Duration::from_secs(65)));
        assert_eq!(state.elapsed_seconds, 75);
        assert!(!state.refresh(now + Duration::from_millis(65_400)));
    }

    #[test]
    fn refresh_on_stopped_timer_is_noop() {
        let mut state = TimerState::new(OFFICE_TIMER);
        assert!(!state.refresh(Instant::now() + Duration::from_secs(30)));
        assert_eq!(state.elapsed_seconds, 0);
    }

    #[test]
    fn matches_accounts_for_time_passed() {
        let now = Instant::now();
        let earlier = TimerState::from_check(ACTIVITY_TIMER, &TimerCheck::running(10, None), now, Utc::now());
        let later_now = now + Duration::from_secs(5);
        let later = TimerState::from_check(ACTIVITY_TIMER, &TimerCheck::running(15, None), later_now, Utc::now());
        assert!(earlier.matches(&later, later_now));

        let other_form = TimerState::from_check(
            ACTIVITY_TIMER,
            &TimerCheck::running(15, Some(json!({"selectedIncident": 1}))),
            later_now,
            Utc::now(),
        );
        assert!(!earlier.matches(&other_form, later_now));
    }
}
