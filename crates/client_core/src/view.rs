//! Seams to the external collaborators that turn engine decisions into
//! something visible.

use std::time::Duration;

use async_trait::async_trait;
use shared::protocol::{LeaderboardEntry, RoundSnapshot, Timestamp};

use crate::ticker::Progress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    Default,
    Image(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// No round yet.
    Lobby,
    /// Round started; the authority waits for viewers to be ready.
    WaitingForQuorum,
    Question,
}

impl Screen {
    pub fn for_snapshot(snapshot: &RoundSnapshot) -> Self {
        match &snapshot.round {
            None => Screen::Lobby,
            Some(round) if round.is_waiting() => Screen::WaitingForQuorum,
            Some(_) => Screen::Question,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RematchPanel {
    pub confirmed: Vec<String>,
    pub joined: bool,
    pub is_admin: bool,
    pub can_start: bool,
}

/// Renders engine output. Called only from the engine loop.
pub trait SessionView: Send {
    fn show_message(&mut self, message: &str);
    /// `answer_sent` is set once this viewer sent an answer for the current
    /// question, and cleared again if that write fails.
    fn show_snapshot(&mut self, snapshot: &RoundSnapshot, screen: Screen, answer_sent: bool);
    fn show_countdown(&mut self, seconds_left: u64);
    fn show_progress(&mut self, progress: Progress);
    fn set_background(&mut self, background: &Background);
    fn show_soft_start(&mut self, duration: Duration);
    fn show_final_board(&mut self, leaderboard: &[LeaderboardEntry]);
    fn show_rematch(&mut self, panel: &RematchPanel);
    fn show_failure(&mut self, message: &str);
}

#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Loads `url` so a later display is instant. False if it could not be
    /// loaded.
    async fn preload(&self, url: &str) -> bool;
}

/// Overlay length when the question opens while this viewer is watching.
pub fn soft_start_on_switch(question_at: Timestamp, now: Timestamp) -> Duration {
    let lateness_ms = lateness_ms(question_at, now);
    let millis = if lateness_ms < 200 {
        900
    } else if lateness_ms < 1200 {
        600
    } else {
        450
    };
    Duration::from_millis(millis)
}

/// Overlay length for a viewer whose first snapshot shows a running
/// question; none if they are on time.
pub fn soft_start_on_join(question_at: Timestamp, now: Timestamp) -> Option<Duration> {
    match lateness_ms(question_at, now) {
        ms if ms <= 200 => None,
        ms if ms > 4000 => Some(Duration::from_millis(350)),
        _ => Some(Duration::from_millis(550)),
    }
}

fn lateness_ms(question_at: Timestamp, now: Timestamp) -> i64 {
    (((now - question_at) * 1000.0).round() as i64).max(0)
}
