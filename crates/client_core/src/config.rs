use std::time::Duration;

/// Tunable timings of the synchronization engine. None of these are protocol
/// requirements; values provided by the authority (countdown length, timer
/// seconds, round count) always take precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Soft poll cadence while a round deadline is pending.
    pub poll_interval: Duration,
    /// Soft poll cadence while waiting for the next question.
    pub probe_interval: Duration,
    /// Added past a round deadline before re-fetching.
    pub deadline_slop: Duration,
    pub progress_interval: Duration,
    /// Below this remaining time no visible countdown is shown.
    pub countdown_skip_threshold: Duration,
    pub preload_wait_cap: Duration,
    pub fallback_buffer: Duration,
    /// Used when a round does not carry `countdown_sec`.
    pub default_countdown_sec: f64,
    pub rematch_poll_interval: Duration,
    pub connectivity_badge_ttl: Duration,
    pub write_retry: RetryPolicy,
    /// Defaults offered to the admin before the authority reports its own.
    pub default_timer_seconds: u32,
    pub default_rounds_total: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            probe_interval: Duration::from_millis(1000),
            deadline_slop: Duration::from_millis(300),
            progress_interval: Duration::from_millis(250),
            countdown_skip_threshold: Duration::from_millis(200),
            preload_wait_cap: Duration::from_millis(1200),
            fallback_buffer: Duration::from_millis(400),
            default_countdown_sec: 3.0,
            rematch_poll_interval: Duration::from_millis(2000),
            connectivity_badge_ttl: Duration::from_millis(2500),
            write_retry: RetryPolicy::default(),
            default_timer_seconds: 30,
            default_rounds_total: 10,
        }
    }
}

/// Bounded retry with linear backoff: attempt `n` (1-based) waits
/// `base_delay * n` before running again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
        }
    }
}
