//! Incident countdown derived from wall-clock time
//!
//! Remaining time is always recomputed from the start instant, so a delayed
//! or skipped tick never makes the display drift.

use tokio::time::Instant;

/// Result of advancing a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting, with the seconds left
    Running(u64),
    /// Reached zero on this tick
    Completed,
    /// Already completed earlier, nothing changed
    Idle,
}

/// Countdown for the incident tied to the running activity timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    pub incident_id: u64,
    pub initial_remaining: u64,
    pub started_at: Instant,
    pub remaining: u64,
    pub completed: bool,
}

impl Countdown {
    /// Start a countdown. One with nothing left is completed from the outset.
    pub fn start(incident_id: u64, initial_remaining: u64, started_at: Instant) -> Self {
        Self {
            incident_id,
            initial_remaining,
            started_at,
            remaining: initial_remaining,
            completed: initial_remaining == 0,
        }
    }

    /// Seconds left at `now`, never below zero
    pub fn remaining_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started_at);
        self.initial_remaining.saturating_sub(elapsed.as_secs())
    }

    /// Recompute the remaining time and flag completion once
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.completed {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining_at(now);
        if self.remaining == 0 {
            self.completed = true;
            TickOutcome::Completed
        } else {
            TickOutcome::Running(self.remaining)
        }
    }
}
