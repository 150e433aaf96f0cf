//! Lobby confirmation polling after a session ended.

use std::time::Duration;

use shared::{domain::UserId, protocol::RematchState};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::{
    timers::{TimerSlot, TimerToken},
    view::RematchPanel,
};

#[derive(Debug)]
pub struct RematchWatcher {
    period: Duration,
    slot: TimerSlot,
    last: Option<RematchState>,
}

impl RematchWatcher {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            slot: TimerSlot::new(),
            last: None,
        }
    }

    pub fn start<E, F>(&mut self, tx: &UnboundedSender<E>, make: F)
    where
        E: Send + 'static,
        F: Fn(TimerToken) -> E + Send + 'static,
    {
        debug!(period_ms = self.period.as_millis() as u64, "rematch: watching");
        self.slot.arm_every(self.period, tx, make);
    }

    pub fn stop(&mut self) {
        self.slot.disarm();
        self.last = None;
    }

    pub fn is_watching(&self) -> bool {
        self.slot.is_armed()
    }

    pub fn is_current(&self, token: TimerToken) -> bool {
        self.slot.is_current(token)
    }

    pub fn last(&self) -> Option<&RematchState> {
        self.last.as_ref()
    }

    /// Stores the latest lobby state and derives what `viewer` should see.
    pub fn record(&mut self, state: RematchState, viewer: UserId) -> RematchPanel {
        let panel = RematchPanel {
            confirmed: state
                .confirmed_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            joined: state.is_confirmed(viewer),
            is_admin: state.is_admin(viewer),
            can_start: state.can_start(),
        };
        self.last = Some(state);
        panel
    }
}
