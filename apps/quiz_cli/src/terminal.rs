//! Line-oriented rendering of engine output.

use std::{io::Write, time::Duration};

use client_core::{Background, Progress, RematchPanel, Screen, SessionView};
use shared::{
    domain::{Role, UserId},
    protocol::{LeaderboardEntry, RoundSnapshot},
};

pub struct TerminalView<W: Write + Send> {
    out: W,
    viewer: UserId,
    last_progress: Option<String>,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W, viewer: UserId) -> Self {
        Self {
            out,
            viewer,
            last_progress: None,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl AsRef<str>) {
        if let Err(err) = writeln!(self.out, "{}", text.as_ref()) {
            tracing::warn!(error = %err, "terminal: write failed");
        }
    }

    fn players_line(&mut self, snapshot: &RoundSnapshot) {
        if snapshot.players.is_empty() {
            return;
        }
        let names: Vec<String> = snapshot
            .players
            .values()
            .map(|player| {
                if player.answered {
                    format!("{} ✓", player.name)
                } else {
                    player.name.clone()
                }
            })
            .collect();
        self.line(format!("players: {}", names.join(", ")));
    }

    fn scores_line(&mut self, snapshot: &RoundSnapshot) {
        if snapshot.scores.is_empty() {
            return;
        }
        let mut scores: Vec<(String, i64)> = snapshot
            .scores
            .iter()
            .map(|(id, score)| {
                let name = snapshot
                    .players
                    .get(id)
                    .map_or_else(|| id.clone(), |player| player.name.clone());
                (name, *score)
            })
            .collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let scores: Vec<String> = scores
            .into_iter()
            .map(|(name, score)| format!("{name} {score}"))
            .collect();
        self.line(format!("scores: {}", scores.join(", ")));
    }
}

impl<W: Write + Send> SessionView for TerminalView<W> {
    fn show_message(&mut self, message: &str) {
        self.line(message);
    }

    fn show_snapshot(&mut self, snapshot: &RoundSnapshot, screen: Screen, answer_sent: bool) {
        self.last_progress = None;
        match screen {
            Screen::Lobby => {
                if snapshot.role == Role::Admin {
                    self.line("Lobby. Type `start` when everyone is here.");
                } else {
                    self.line("Lobby. Waiting for the admin to start.");
                }
                self.players_line(snapshot);
            }
            Screen::WaitingForQuorum => {
                self.line(format!(
                    "Get ready... ({}/{} ready)",
                    snapshot.answered_count(),
                    snapshot.players.len()
                ));
            }
            Screen::Question => {
                let Some(question) = &snapshot.question else {
                    self.line("Waiting for the question...");
                    return;
                };
                let revealed = snapshot.revealed_answer();
                let mut lines = vec![format!("Q: {}", question.text)];
                for (index, option) in question.options.iter().enumerate() {
                    let marker = if revealed == Some(index) { " <- correct" } else { "" };
                    lines.push(format!("  {}) {option}{marker}", index + 1));
                }
                for line in lines {
                    self.line(line);
                }
                if answer_sent || snapshot.has_answered(self.viewer) {
                    self.line("(answer submitted)");
                }
                self.players_line(snapshot);
                self.scores_line(snapshot);
            }
        }
    }

    fn show_countdown(&mut self, seconds_left: u64) {
        if seconds_left == 0 {
            self.line("Go!");
        } else {
            self.line(format!("{seconds_left}..."));
        }
    }

    fn show_progress(&mut self, progress: Progress) {
        let label = progress.label();
        if self.last_progress.as_deref() == Some(label.as_str()) {
            return;
        }
        self.line(format!("[{label} left, {}%]", progress.percent));
        self.last_progress = Some(label);
    }

    fn set_background(&mut self, background: &Background) {
        if let Background::Image(url) = background {
            self.line(format!("(image: {url})"));
        }
    }

    fn show_soft_start(&mut self, duration: Duration) {
        tracing::debug!(ms = duration.as_millis() as u64, "terminal: soft start");
    }

    fn show_final_board(&mut self, leaderboard: &[LeaderboardEntry]) {
        self.line("Final standings:");
        let rows: Vec<String> = leaderboard
            .iter()
            .enumerate()
            .map(|(rank, entry)| {
                format!(
                    "  {}. {} {} ({:.1}s)",
                    rank + 1,
                    entry.name,
                    entry.score,
                    entry.total_time
                )
            })
            .collect();
        for row in rows {
            self.line(row);
        }
    }

    fn show_rematch(&mut self, panel: &RematchPanel) {
        let who = if panel.confirmed.is_empty() {
            "nobody yet".to_string()
        } else {
            panel.confirmed.join(", ")
        };
        self.line(format!("Next game: {who}"));
        let hint = match (panel.joined, panel.is_admin && panel.can_start) {
            (_, true) => "Type `restart` to begin, `rematch` to toggle your spot.",
            (true, false) => "You are in. Type `rematch` to leave.",
            (false, false) => "Type `rematch` to join.",
        };
        self.line(hint);
    }

    fn show_failure(&mut self, message: &str) {
        self.line(format!("! {message}"));
    }
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
