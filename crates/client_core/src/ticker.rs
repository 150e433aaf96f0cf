//! Purely local interpolation of the remaining round time between fetches.

use std::time::Duration;

use shared::protocol::Timestamp;
use tokio::sync::mpsc::UnboundedSender;

use crate::timers::{TimerSlot, TimerToken};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Seconds left until the deadline, never negative.
    pub remaining: f64,
    /// Share of the round already elapsed, 0..=100.
    pub percent: u8,
}

impl Progress {
    pub fn at(deadline: Timestamp, total_secs: f64, now: Timestamp) -> Self {
        let remaining = (deadline - now).max(0.0);
        let total = total_secs.max(1.0);
        let percent = (100.0 * (total - remaining) / total).round().clamp(0.0, 100.0) as u8;
        Self { remaining, percent }
    }

    pub fn is_done(&self) -> bool {
        self.remaining <= 0.0
    }

    /// `M:SS` for a minute or more, otherwise `Ns`.
    pub fn label(&self) -> String {
        let secs = self.remaining.floor() as u64;
        let (minutes, rest) = (secs / 60, secs % 60);
        if minutes > 0 {
            format!("{minutes}:{rest:02}")
        } else {
            format!("{rest}s")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Target {
    deadline: Timestamp,
    total_secs: f64,
}

#[derive(Debug)]
pub struct LocalProgressTicker {
    period: Duration,
    slot: TimerSlot,
    target: Option<Target>,
}

impl LocalProgressTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            slot: TimerSlot::new(),
            target: None,
        }
    }

    /// Starts ticking towards `deadline`. A running ticker for the same
    /// deadline and duration keeps going; any other target restarts it.
    /// Returns true when a new ticker was started.
    pub fn start<E, F>(&mut self, deadline: Timestamp, total_secs: f64, tx: &UnboundedSender<E>, make: F) -> bool
    where
        E: Send + 'static,
        F: Fn(TimerToken) -> E + Send + 'static,
    {
        let target = Target {
            deadline,
            total_secs,
        };
        if self.target == Some(target) && self.slot.is_armed() {
            return false;
        }
        self.target = Some(target);
        self.slot.arm_every(self.period, tx, make);
        true
    }

    pub fn stop(&mut self) {
        self.target = None;
        self.slot.disarm();
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_armed()
    }

    pub fn current(&self, now: Timestamp) -> Option<Progress> {
        self.target
            .map(|target| Progress::at(target.deadline, target.total_secs, now))
    }

    /// Progress for a fired tick, or `None` for a stale one. Stops itself
    /// once the deadline has passed.
    pub fn tick(&mut self, token: TimerToken, now: Timestamp) -> Option<Progress> {
        if !self.slot.is_current(token) {
            return None;
        }
        let progress = self.current(now)?;
        if progress.is_done() {
            self.stop();
        }
        Some(progress)
    }
}

#[cfg(test)]
#[path = "tests/ticker_tests.rs"]
mod tests;
