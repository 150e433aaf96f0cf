//! Re-armable wake-ups that post generation-tagged events into the engine
//! loop.

use std::time::Duration;

use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time::MissedTickBehavior};

/// Generation counter of a [`TimerSlot`]; a fired event is acted on only if
/// its token is still current.
pub type TimerToken = u64;

/// Holds at most one pending wake-up. Arming replaces the previous one and
/// bumps the generation, so a wake-up that fires while its abort is in
/// flight is recognised as stale.
#[derive(Debug, Default)]
pub struct TimerSlot {
    generation: TimerToken,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_after<E, F>(&mut self, delay: Duration, tx: &UnboundedSender<E>, make: F) -> TimerToken
    where
        E: Send + 'static,
        F: FnOnce(TimerToken) -> E + Send + 'static,
    {
        let token = self.rearm();
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(make(token));
        }));
        token
    }

    /// Fires every `period`, first after one full period.
    pub fn arm_every<E, F>(&mut self, period: Duration, tx: &UnboundedSender<E>, make: F) -> TimerToken
    where
        E: Send + 'static,
        F: Fn(TimerToken) -> E + Send + 'static,
    {
        let token = self.rearm();
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticks = tokio::time::interval_at(start, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if tx.send(make(token)).is_err() {
                    break;
                }
            }
        }));
        token
    }

    pub fn disarm(&mut self) {
        self.rearm();
    }

    pub fn is_current(&self, token: TimerToken) -> bool {
        self.handle.is_some() && self.generation == token
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Forgets a one-shot wake-up that has just been delivered.
    pub fn consume(&mut self, token: TimerToken) -> bool {
        if self.is_current(token) {
            self.handle = None;
            true
        } else {
            false
        }
    }

    fn rearm(&mut self) -> TimerToken {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
        self.generation
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
