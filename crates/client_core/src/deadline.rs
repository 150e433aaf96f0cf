//! Wake-up aligned just past the server-declared round deadline.

use std::time::Duration;

use shared::protocol::Timestamp;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::timers::{TimerSlot, TimerToken};

/// `max(0, deadline - now) + slop`, so the fetch lands after the authority
/// considers the round closed, never before.
pub fn deadline_delay(deadline: Timestamp, now: Timestamp, slop: Duration) -> Duration {
    let until = deadline - now;
    let until = if until > 0.0 {
        Duration::try_from_secs_f64(until).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    };
    until.saturating_add(slop)
}

#[derive(Debug)]
pub struct DeadlineScheduler {
    slop: Duration,
    slot: TimerSlot,
    armed_for: Option<Timestamp>,
}

impl DeadlineScheduler {
    pub fn new(slop: Duration) -> Self {
        Self {
            slop,
            slot: TimerSlot::new(),
            armed_for: None,
        }
    }

    /// Replaces any pending wake-up with one for `deadline`.
    pub fn arm<E, F>(&mut self, deadline: Timestamp, now: Timestamp, tx: &UnboundedSender<E>, make: F)
    where
        E: Send + 'static,
        F: FnOnce(TimerToken) -> E + Send + 'static,
    {
        let delay = deadline_delay(deadline, now, self.slop);
        debug!(deadline, delay_ms = delay.as_millis() as u64, "deadline: armed");
        self.slot.arm_after(delay, tx, make);
        self.armed_for = Some(deadline);
    }

    pub fn disarm(&mut self) {
        if self.armed_for.take().is_some() {
            debug!("deadline: disarmed");
        }
        self.slot.disarm();
    }

    pub fn armed_for(&self) -> Option<Timestamp> {
        self.armed_for
    }

    /// Accepts a fired wake-up if it is the one currently armed.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        if self.slot.consume(token) {
            self.armed_for = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[path = "tests/deadline_tests.rs"]
mod tests;
