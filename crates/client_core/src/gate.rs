//! Decides whether a freshly fetched snapshot is worth applying.

use shared::protocol::RoundSnapshot;

/// A soft fetch is opportunistic (polls, deadline wake-ups) and is dropped
/// when nothing changed; a hard fetch is an explicit refresh and always
/// results in an update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Soft,
    Hard,
}

/// True when `next` starts a question `prev` did not show.
pub fn is_new_question(prev: Option<&RoundSnapshot>, next: &RoundSnapshot) -> bool {
    match (prev.and_then(RoundSnapshot::started_at), next.started_at()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(before), Some(after)) => before != after,
    }
}

pub fn should_accept(prev: Option<&RoundSnapshot>, next: &RoundSnapshot, mode: FetchMode) -> bool {
    if mode == FetchMode::Hard {
        return true;
    }
    let Some(prev) = prev else {
        return true;
    };
    next.revision != prev.revision || is_new_question(Some(prev), next)
}

#[cfg(test)]
#[path = "tests/gate_tests.rs"]
mod tests;
