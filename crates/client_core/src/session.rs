//! Everything the engine remembers between loop turns.
//!
//! Snapshot-derived state changes only through [`SessionContext::accept`],
//! [`SessionContext::reset`] and [`SessionContext::end`]; timers are owned
//! here so a reset or teardown disarms all of them in one place.

use std::time::Duration;

use shared::protocol::{RoundSnapshot, Timestamp};
use tracing::{debug, info};

use crate::{
    config::EngineConfig,
    countdown::{CountdownOrchestrator, CountdownTimings},
    deadline::DeadlineScheduler,
    rematch::RematchWatcher,
    ticker::LocalProgressTicker,
    timers::TimerSlot,
    view::Background,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Live,
    Ended,
}

/// Outcome of accepting a snapshot, relative to the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub first: bool,
    pub new_question: bool,
    /// The replaced snapshot was waiting for the question phase.
    pub was_waiting: bool,
}

#[derive(Debug)]
pub struct SessionTimers {
    pub poll: TimerSlot,
    pub poll_cadence: Option<Duration>,
    pub deadline: DeadlineScheduler,
    pub ticker: LocalProgressTicker,
    pub countdown_tick: TimerSlot,
    pub preload_cap: TimerSlot,
    pub fallback: TimerSlot,
    pub deferred_background: TimerSlot,
    pub badge: TimerSlot,
    pub rematch: RematchWatcher,
}

impl SessionTimers {
    fn new(config: &EngineConfig) -> Self {
        Self {
            poll: TimerSlot::new(),
            poll_cadence: None,
            deadline: DeadlineScheduler::new(config.deadline_slop),
            ticker: LocalProgressTicker::new(config.progress_interval),
            countdown_tick: TimerSlot::new(),
            preload_cap: TimerSlot::new(),
            fallback: TimerSlot::new(),
            deferred_background: TimerSlot::new(),
            badge: TimerSlot::new(),
            rematch: RematchWatcher::new(config.rematch_poll_interval),
        }
    }

    pub fn stop_polling(&mut self) {
        self.poll.disarm();
        self.poll_cadence = None;
    }

    pub fn cancel_countdown(&mut self) {
        self.countdown_tick.disarm();
        self.preload_cap.disarm();
        self.fallback.disarm();
    }

    /// Disarms every session timer. The badge auto-hide survives since the
    /// indicator outlives sessions.
    fn disarm_all(&mut self) {
        self.stop_polling();
        self.deadline.disarm();
        self.ticker.stop();
        self.cancel_countdown();
        self.deferred_background.disarm();
        self.rematch.stop();
    }
}

#[derive(Debug)]
pub struct SessionContext {
    epoch: u64,
    phase: SessionPhase,
    last_snapshot: Option<RoundSnapshot>,
    /// `started_at` of the question an answer was submitted for.
    answer_lock: Option<Timestamp>,
    background: Background,
    pub countdown: CountdownOrchestrator,
    pub timers: SessionTimers,
}

impl SessionContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            epoch: 0,
            phase: SessionPhase::Live,
            last_snapshot: None,
            answer_lock: None,
            background: Background::Default,
            countdown: CountdownOrchestrator::new(CountdownTimings {
                skip_threshold: config.countdown_skip_threshold,
                preload_cap: config.preload_wait_cap,
                fallback_buffer: config.fallback_buffer,
            }),
            timers: SessionTimers::new(config),
        }
    }

    /// Bumped by every reset; results of work issued under an older epoch
    /// belong to a previous session.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_live(&self) -> bool {
        self.phase == SessionPhase::Live
    }

    pub fn last_snapshot(&self) -> Option<&RoundSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn last_revision(&self) -> Option<i64> {
        self.last_snapshot.as_ref().map(|snapshot| snapshot.revision)
    }

    pub fn current_started_at(&self) -> Option<Timestamp> {
        self.last_snapshot.as_ref().and_then(RoundSnapshot::started_at)
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    /// Records the background on screen. False if it was already showing.
    pub fn set_background(&mut self, background: Background) -> bool {
        if self.background == background {
            false
        } else {
            self.background = background;
            true
        }
    }

    /// Replaces the last accepted snapshot wholesale.
    pub fn accept(&mut self, snapshot: RoundSnapshot) -> Accepted {
        let previous = self.last_snapshot.as_ref();
        let accepted = Accepted {
            first: previous.is_none(),
            new_question: crate::gate::is_new_question(previous, &snapshot),
            was_waiting: previous
                .and_then(|prev| prev.round.as_ref())
                .is_some_and(|round| round.is_waiting()),
        };
        if accepted.new_question {
            self.answer_lock = None;
        }
        debug!(
            revision = snapshot.revision,
            previous = ?self.last_revision(),
            new_question = accepted.new_question,
            "session: snapshot accepted"
        );
        self.last_snapshot = Some(snapshot);
        accepted
    }

    /// Locks answering for the current question. False if an answer is
    /// already locked or there is no question to answer.
    pub fn lock_answer(&mut self) -> bool {
        let Some(started_at) = self.current_started_at() else {
            return false;
        };
        if self.answer_lock == Some(started_at) {
            return false;
        }
        self.answer_lock = Some(started_at);
        true
    }

    pub fn release_answer(&mut self) {
        self.answer_lock = None;
    }

    pub fn answer_locked(&self) -> bool {
        self.answer_lock.is_some() && self.answer_lock == self.current_started_at()
    }

    /// Stops every timer and any running countdown; snapshot state stays.
    pub fn teardown(&mut self) {
        self.countdown.cancel();
        self.timers.disarm_all();
    }

    /// Terminal transition of the current session.
    pub fn end(&mut self) {
        if self.phase == SessionPhase::Ended {
            return;
        }
        info!(revision = ?self.last_revision(), "session: ended");
        self.teardown();
        self.phase = SessionPhase::Ended;
    }

    /// Fresh session: forgets everything learned from the previous one.
    pub fn reset(&mut self) {
        self.teardown();
        self.epoch += 1;
        self.phase = SessionPhase::Live;
        self.last_snapshot = None;
        self.answer_lock = None;
        info!(epoch = self.epoch, "session: reset");
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
