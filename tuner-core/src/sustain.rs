//! # Sustain Timer Module
//!
//! A counted, periodic tick schedule used to hold the last reading across brief
//! signal dropouts. The timer owns no thread: the consumer loop asks for the
//! next deadline and polls it with the current time, so every tick runs on the
//! same thread that mutates the session.

use std::time::{Duration, Instant};

/// What a due tick asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SustainEvent {
    /// Republish the held reading unchanged.
    Tick,
    /// The tick budget is spent: clear the reading. The timer is disarmed.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SustainTimer {
    interval: Duration,
    max_ticks: u32,
    elapsed_ticks: u32,
    next_due: Option<Instant>,
}

impl SustainTimer {
    /// Creates a disarmed timer.
    ///
    /// # Arguments
    /// * `interval` - Time between ticks
    /// * `max_ticks` - Tick on which the held reading expires (at least 1)
    pub fn new(interval: Duration, max_ticks: u32) -> Self {
        Self {
            interval,
            max_ticks: max_ticks.max(1),
            elapsed_ticks: 0,
            next_due: None,
        }
    }

    /// Starts the schedule. Arming an armed timer does nothing, so repeated
    /// silent samples do not push the expiry further out.
    pub fn arm(&mut self, now: Instant) {
        if self.next_due.is_none() {
            self.elapsed_ticks = 0;
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
        self.elapsed_ticks = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    /// Fires at most one due tick.
    ///
    /// Ticks are scheduled from the previous deadline rather than from `now`,
    /// so a late poll catches up by calling this repeatedly.
    ///
    /// # Returns
    /// * `Some(SustainEvent::Tick)` - A tick was due and the budget is not spent
    /// * `Some(SustainEvent::Expired)` - The final tick was due; the timer is now disarmed
    /// * `None` - Disarmed, or the next tick is not due yet
    pub fn poll(&mut self, now: Instant) -> Option<SustainEvent> {
        let due = self.next_due?;
        if now < due {
            return None;
        }

        self.elapsed_ticks += 1;
        if self.elapsed_ticks >= self.max_ticks {
            self.cancel();
            Some(SustainEvent::Expired)
        } else {
            self.next_due = Some(due + self.interval);
            Some(SustainEvent::Tick)
        }
    }
}
