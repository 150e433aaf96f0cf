//! Pre-question countdown synchronized to the authority's start timestamp.
//!
//! The orchestrator is a pure state machine: every input carries the current
//! time and returns the effects the engine must carry out. Scheduled inputs
//! (`tick`, `preload_cap_expired`, `fallback`) and preload completions carry
//! the `started_at` they were issued for; a mismatch with the running
//! countdown means the input is stale and it is ignored.

use std::time::Duration;

use shared::protocol::{RoundInfo, Timestamp};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Idle,
    CountingDown,
    Finishing,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountdownState {
    pub active: bool,
    pub for_started_at: Option<Timestamp>,
    pub target_end: Option<Timestamp>,
    pub pending_image: Option<String>,
    pub image_ready: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountdownEffect {
    /// Drop every countdown wake-up still scheduled.
    CancelTimers,
    ResetBackground,
    ShowCountdown { seconds_left: u64 },
    /// Start loading the question image; report back with `image_loaded`.
    Preload { started_at: Timestamp, url: String },
    /// Best-effort load, then apply as background (countdown skipped).
    PreloadAndApply { started_at: Timestamp, url: String },
    ScheduleTick { started_at: Timestamp, after: Duration },
    SchedulePreloadCap { started_at: Timestamp, after: Duration },
    ScheduleFallback { started_at: Timestamp, after: Duration },
    ApplyBackground { url: String },
    /// Apply on the next loop turn, after the image had a chance to load.
    ApplyBackgroundDeferred { url: String },
    /// Acknowledge readiness (when the authority expects it), then force a
    /// hard refetch.
    RoundReady,
}

#[derive(Debug, Clone, Copy)]
pub struct CountdownTimings {
    pub skip_threshold: Duration,
    pub preload_cap: Duration,
    pub fallback_buffer: Duration,
}

#[derive(Debug)]
pub struct CountdownOrchestrator {
    timings: CountdownTimings,
    phase: CountdownPhase,
    state: CountdownState,
    preload_failed: bool,
    shown: Option<u64>,
}

impl CountdownOrchestrator {
    pub fn new(timings: CountdownTimings) -> Self {
        Self {
            timings,
            phase: CountdownPhase::Idle,
            state: CountdownState::default(),
            preload_failed: false,
            shown: None,
        }
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn state(&self) -> &CountdownState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// The value last shown on the countdown screen.
    pub fn seconds_shown(&self) -> Option<u64> {
        self.shown
    }

    /// A new question with identity `started_at` was accepted.
    pub fn begin(
        &mut self,
        started_at: Timestamp,
        countdown_sec: f64,
        image: Option<String>,
        now: Timestamp,
    ) -> Vec<CountdownEffect> {
        if self.state.active && self.state.for_started_at == Some(started_at) {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.state.active {
            info!(
                superseded = ?self.state.for_started_at,
                started_at, "countdown: superseded by newer question"
            );
            self.reset();
            effects.push(CountdownEffect::CancelTimers);
        }

        let target_end = started_at + countdown_sec;
        let remaining_ms = millis_between(now, target_end);
        if remaining_ms <= self.timings.skip_threshold.as_millis() as i64 {
            info!(started_at, remaining_ms, "countdown: skipped, too late to show");
            if let Some(url) = image {
                effects.push(CountdownEffect::PreloadAndApply { started_at, url });
            }
            effects.push(CountdownEffect::RoundReady);
            return effects;
        }

        info!(started_at, target_end, remaining_ms, "countdown: started");
        self.phase = CountdownPhase::CountingDown;
        self.state = CountdownState {
            active: true,
            for_started_at: Some(started_at),
            target_end: Some(target_end),
            image_ready: image.is_none(),
            pending_image: image.clone(),
        };

        effects.push(CountdownEffect::ResetBackground);
        if let Some(url) = image {
            effects.push(CountdownEffect::Preload { started_at, url });
        }
        let fallback = Duration::try_from_secs_f64(countdown_sec.max(0.0))
            .unwrap_or(Duration::MAX)
            .saturating_add(self.timings.preload_cap)
            .saturating_add(self.timings.fallback_buffer);
        effects.push(CountdownEffect::ScheduleFallback {
            started_at,
            after: fallback,
        });
        effects.extend(self.advance(started_at, remaining_ms));
        effects
    }

    pub fn tick(&mut self, started_at: Timestamp, now: Timestamp) -> Vec<CountdownEffect> {
        if !self.is_running(started_at, CountdownPhase::CountingDown) {
            debug!(started_at, "countdown: stale tick ignored");
            return Vec::new();
        }
        let Some(target_end) = self.state.target_end else {
            return Vec::new();
        };
        self.advance(started_at, millis_between(now, target_end))
    }

    pub fn image_loaded(&mut self, started_at: Timestamp, ok: bool) -> Vec<CountdownEffect> {
        if !self.state.active || self.state.for_started_at != Some(started_at) {
            return Vec::new();
        }
        debug!(started_at, ok, "countdown: image preload settled");
        self.state.image_ready = ok;
        self.preload_failed = !ok;
        if self.phase == CountdownPhase::Finishing {
            self.complete()
        } else {
            Vec::new()
        }
    }

    pub fn preload_cap_expired(&mut self, started_at: Timestamp) -> Vec<CountdownEffect> {
        if !self.is_running(started_at, CountdownPhase::Finishing) {
            return Vec::new();
        }
        debug!(started_at, "countdown: preload wait capped");
        self.complete()
    }

    /// Hard fallback: finishes the countdown even if ticks stalled.
    pub fn fallback(&mut self, started_at: Timestamp) -> Vec<CountdownEffect> {
        if !self.state.active || self.state.for_started_at != Some(started_at) {
            return Vec::new();
        }
        info!(started_at, phase = ?self.phase, "countdown: hard fallback fired");
        match self.phase {
            CountdownPhase::CountingDown => {
                let mut effects = self.show(0);
                effects.extend(self.enter_finishing(started_at));
                effects
            }
            CountdownPhase::Finishing => self.complete(),
            CountdownPhase::Idle => Vec::new(),
        }
    }

    /// Ends the countdown at once if the authority already opened the
    /// question phase for the same question. Idempotent.
    pub fn dismiss_if_live(&mut self, round: &RoundInfo, now: Timestamp) -> Vec<CountdownEffect> {
        if !self.state.active
            || self.state.for_started_at != Some(round.started_at)
            || !round.question_live(now)
        {
            return Vec::new();
        }
        info!(started_at = round.started_at, "countdown: dismissed, question already live");
        let mut effects = Vec::new();
        if let Some(url) = self.state.pending_image.clone() {
            if self.state.image_ready {
                effects.push(CountdownEffect::ApplyBackground { url });
            } else if !self.preload_failed {
                effects.push(CountdownEffect::ApplyBackgroundDeferred { url });
            }
        }
        effects.push(CountdownEffect::CancelTimers);
        self.reset();
        effects
    }

    /// Drops any running countdown without signalling readiness.
    pub fn cancel(&mut self) -> Vec<CountdownEffect> {
        if !self.state.active {
            return Vec::new();
        }
        self.reset();
        vec![CountdownEffect::CancelTimers]
    }

    fn advance(&mut self, started_at: Timestamp, remaining_ms: i64) -> Vec<CountdownEffect> {
        if remaining_ms <= 0 {
            let mut effects = self.show(0);
            effects.extend(self.enter_finishing(started_at));
            return effects;
        }
        let seconds_left = (remaining_ms as u64).div_ceil(1000);
        let until_next = remaining_ms as u64 - (seconds_left - 1) * 1000;
        let mut effects = self.show(seconds_left);
        effects.push(CountdownEffect::ScheduleTick {
            started_at,
            after: Duration::from_millis(until_next),
        });
        effects
    }

    fn show(&mut self, seconds_left: u64) -> Vec<CountdownEffect> {
        if self.shown == Some(seconds_left) {
            Vec::new()
        } else {
            self.shown = Some(seconds_left);
            vec![CountdownEffect::ShowCountdown { seconds_left }]
        }
    }

    fn enter_finishing(&mut self, started_at: Timestamp) -> Vec<CountdownEffect> {
        info!(started_at, "countdown: finishing");
        self.phase = CountdownPhase::Finishing;
        if self.state.image_ready || self.preload_failed {
            self.complete()
        } else {
            vec![CountdownEffect::SchedulePreloadCap {
                started_at,
                after: self.timings.preload_cap,
            }]
        }
    }

    fn complete(&mut self) -> Vec<CountdownEffect> {
        let mut effects = Vec::new();
        if let Some(url) = self.state.pending_image.clone() {
            if !self.preload_failed {
                effects.push(CountdownEffect::ApplyBackground { url });
            }
        }
        effects.push(CountdownEffect::RoundReady);
        effects.push(CountdownEffect::CancelTimers);
        info!(started_at = ?self.state.for_started_at, "countdown: complete");
        self.reset();
        effects
    }

    fn is_running(&self, started_at: Timestamp, phase: CountdownPhase) -> bool {
        self.state.active && self.phase == phase && self.state.for_started_at == Some(started_at)
    }

    fn reset(&mut self) {
        self.phase = CountdownPhase::Idle;
        self.state = CountdownState::default();
        self.preload_failed = false;
        self.shown = None;
    }
}

fn millis_between(from: Timestamp, to: Timestamp) -> i64 {
    ((to - from) * 1000.0).round() as i64
}

#[cfg(test)]
#[path = "tests/countdown_tests.rs"]
mod tests;
