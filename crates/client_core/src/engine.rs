//! The synchronization loop. One task owns the session context; timers,
//! reads, writes and preloads run elsewhere and report back as events, so
//! every state change happens on this task in arrival order.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::SessionKey,
    protocol::{Ack, LeaderboardEntry, Mutation, RematchState, RoundSnapshot, Timestamp},
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    config::EngineConfig,
    countdown::CountdownEffect,
    error::SyncError,
    gate::{self, FetchMode},
    remote::{proxied_image_url, Connectivity, QuizApi, ReadTicket, RemoteStateClient},
    session::{Accepted, SessionContext},
    timers::TimerToken,
    view::{soft_start_on_join, soft_start_on_switch, Background, ImageLoader, Screen, SessionView},
};

/// Inputs from the person in front of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Explicit refresh; always results in an update attempt.
    Refresh,
    SubmitAnswer { option: usize },
    Configure { timer_seconds: u32, rounds_total: u32 },
    /// Stores the settings, then starts the first question.
    StartQuiz { timer_seconds: u32, rounds_total: u32 },
    NextQuestion,
    ForceStart,
    EndQuiz,
    /// Joins the rematch lobby, or leaves it if already confirmed.
    ToggleRematch,
    StartRematch,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RematchFetch {
    /// Final leaderboard plus lobby, right after the session ended.
    Board,
    Panel,
    /// Fresh lobby state to decide between joining and leaving.
    Toggle,
}

#[derive(Debug)]
enum EngineEvent {
    PollDue(TimerToken),
    DeadlineDue(TimerToken),
    ProgressDue(TimerToken),
    CountdownTickDue { token: TimerToken, started_at: Timestamp },
    PreloadCapDue { token: TimerToken, started_at: Timestamp },
    FallbackDue { token: TimerToken, started_at: Timestamp },
    DeferredBackgroundDue { token: TimerToken, url: String },
    BadgeExpired(TimerToken),
    RematchDue(TimerToken),
    ReadFinished {
        ticket: ReadTicket,
        result: Result<RoundSnapshot, SyncError>,
    },
    ImageLoaded { started_at: Timestamp, ok: bool },
    SkippedImageLoaded { started_at: Timestamp, url: String, ok: bool },
    WriteFinished {
        epoch: u64,
        mutation: Mutation,
        result: Result<Ack, SyncError>,
    },
    RematchLoaded {
        epoch: u64,
        purpose: RematchFetch,
        result: Result<RematchState, SyncError>,
    },
}

pub struct SyncEngine {
    core: EngineCore,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

struct EngineCore {
    config: EngineConfig,
    session: SessionKey,
    display_name: String,
    image_proxy: Option<String>,
    remote: RemoteStateClient,
    loader: Arc<dyn ImageLoader>,
    clock: Arc<dyn Clock>,
    view: Box<dyn SessionView>,
    ctx: SessionContext,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl SyncEngine {
    pub fn new(
        config: EngineConfig,
        session: SessionKey,
        api: Arc<dyn QuizApi>,
        loader: Arc<dyn ImageLoader>,
        view: Box<dyn SessionView>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let core = EngineCore {
            remote: RemoteStateClient::new(api, config.write_retry),
            ctx: SessionContext::new(&config),
            display_name: format!("Player {}", session.user_id),
            image_proxy: None,
            config,
            session,
            loader,
            clock,
            view,
            events,
        };
        Self { core, events_rx }
    }

    /// Name shown to others in the rematch lobby.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.core.display_name = name.into();
        self
    }

    /// Routes question images through the authority's image proxy.
    pub fn with_image_proxy(mut self, server_url: impl Into<String>) -> Self {
        self.core.image_proxy = Some(server_url.into());
        self
    }

    pub fn connectivity(&self) -> watch::Receiver<Connectivity> {
        self.core.remote.indicator().subscribe()
    }

    /// Runs until `Shutdown` arrives or every command sender is dropped.
    pub async fn run(self, mut commands: mpsc::Receiver<EngineCommand>) {
        let SyncEngine {
            mut core,
            mut events_rx,
        } = self;
        core.start();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => core.handle_command(command),
                },
                Some(event) = events_rx.recv() => core.handle_event(event),
            }
        }
        core.shutdown();
    }
}

impl EngineCore {
    fn start(&mut self) {
        info!(
            chat_id = %self.session.chat_id,
            user_id = %self.session.user_id,
            "sync: engine started"
        );
        self.view.show_message("Loading...");
        self.view.set_background(&Background::Default);
        self.fetch(FetchMode::Hard);
    }

    fn shutdown(&mut self) {
        self.ctx.teardown();
        self.remote.cancel_read();
        info!("sync: engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        debug!(?command, "sync: command");
        match command {
            EngineCommand::Refresh => self.fetch(FetchMode::Hard),
            EngineCommand::SubmitAnswer { option } => self.submit_answer(option),
            EngineCommand::Configure {
                timer_seconds,
                rounds_total,
            } => self.admin_write(Mutation::Configure {
                timer_seconds,
                rounds_total,
            }),
            EngineCommand::StartQuiz {
                timer_seconds,
                rounds_total,
            } => self.start_quiz(timer_seconds, rounds_total),
            EngineCommand::NextQuestion => self.admin_write(Mutation::Next),
            EngineCommand::ForceStart => self.admin_write(Mutation::ForceStart),
            EngineCommand::EndQuiz => self.admin_write(Mutation::End),
            EngineCommand::ToggleRematch => self.toggle_rematch(),
            EngineCommand::StartRematch => self.start_rematch(),
            EngineCommand::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: EngineEvent) {
        let now = self.clock.now();
        match event {
            EngineEvent::PollDue(token) => {
                if self.ctx.timers.poll.is_current(token) {
                    self.fetch(FetchMode::Soft);
                }
            }
            EngineEvent::DeadlineDue(token) => {
                if self.ctx.timers.deadline.fire(token) {
                    debug!("sync: round deadline passed, refetching");
                    self.fetch(FetchMode::Soft);
                }
            }
            EngineEvent::ProgressDue(token) => {
                if let Some(progress) = self.ctx.timers.ticker.tick(token, now) {
                    self.view.show_progress(progress);
                }
            }
            EngineEvent::CountdownTickDue { token, started_at } => {
                if self.ctx.timers.countdown_tick.consume(token) {
                    let effects = self.ctx.countdown.tick(started_at, now);
                    self.run_effects(effects);
                }
            }
            EngineEvent::PreloadCapDue { token, started_at } => {
                if self.ctx.timers.preload_cap.consume(token) {
                    let effects = self.ctx.countdown.preload_cap_expired(started_at);
                    self.run_effects(effects);
                }
            }
            EngineEvent::FallbackDue { token, started_at } => {
                if self.ctx.timers.fallback.consume(token) {
                    let effects = self.ctx.countdown.fallback(started_at);
                    self.run_effects(effects);
                }
            }
            EngineEvent::DeferredBackgroundDue { token, url } => {
                if self.ctx.timers.deferred_background.consume(token) {
                    self.apply_background(Background::Image(url));
                }
            }
            EngineEvent::BadgeExpired(token) => {
                if self.ctx.timers.badge.consume(token) {
                    self.remote.indicator().read_recovered();
                }
            }
            EngineEvent::RematchDue(token) => {
                if self.ctx.timers.rematch.is_current(token) {
                    self.load_rematch(RematchFetch::Panel);
                }
            }
            EngineEvent::ReadFinished { ticket, result } => self.on_read_finished(ticket, result),
            EngineEvent::ImageLoaded { started_at, ok } => {
                let effects = self.ctx.countdown.image_loaded(started_at, ok);
                self.run_effects(effects);
            }
            EngineEvent::SkippedImageLoaded {
                started_at,
                url,
                ok,
            } => {
                if ok
                    && self.ctx.is_live()
                    && self.ctx.current_started_at() == Some(started_at)
                    && !self.ctx.countdown.is_active()
                {
                    self.apply_background(Background::Image(url));
                }
            }
            EngineEvent::WriteFinished {
                epoch,
                mutation,
                result,
            } => self.on_write_finished(epoch, mutation, result),
            EngineEvent::RematchLoaded {
                epoch,
                purpose,
                result,
            } => self.on_rematch_loaded(epoch, purpose, result),
        }
    }

    /// A soft fetch never overlaps an outstanding read; a hard fetch
    /// supersedes it.
    fn fetch(&mut self, mode: FetchMode) {
        if let Some(in_flight) = self.remote.in_flight() {
            if mode == FetchMode::Soft {
                debug!(read_id = in_flight.id, "sync: soft fetch skipped, read in flight");
                return;
            }
            debug!(read_id = in_flight.id, "sync: hard fetch supersedes in-flight read");
        }
        let (ticket, read) = self.remote.begin_read(mode);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = read.await;
            let _ = events.send(EngineEvent::ReadFinished { ticket, result });
        });
    }

    fn on_read_finished(&mut self, ticket: ReadTicket, result: Result<RoundSnapshot, SyncError>) {
        if !self.remote.finish_read(ticket.id) {
            debug!(read_id = ticket.id, "sync: superseded read result dropped");
            return;
        }
        match result {
            Ok(snapshot) => {
                self.clear_read_failure();
                self.apply_snapshot(snapshot, ticket.mode);
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                warn!(read_id = ticket.id, mode = ?ticket.mode, error = %err, "sync: state read failed");
                self.flag_read_failure();
                if self.ctx.is_live() && !self.ctx.timers.poll.is_armed() {
                    self.schedule_polling(self.config.probe_interval);
                }
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: RoundSnapshot, mode: FetchMode) {
        let now = self.clock.now();
        if snapshot.ended {
            if self.ctx.is_live() {
                self.end_session(Vec::new());
            }
            return;
        }
        if !self.ctx.is_live() {
            debug!(revision = snapshot.revision, "sync: snapshot ignored, session ended");
            return;
        }
        if !snapshot.ok {
            info!("sync: game not found");
            self.view.show_message("Game not found.");
            self.schedule_polling(self.config.probe_interval);
            return;
        }

        let dismissed = match &snapshot.round {
            Some(round) => {
                let effects = self.ctx.countdown.dismiss_if_live(round, now);
                let dismissed = !effects.is_empty();
                self.run_effects(effects);
                dismissed
            }
            None => false,
        };

        if !gate::should_accept(self.ctx.last_snapshot(), &snapshot, mode) {
            debug!(revision = snapshot.revision, "sync: unchanged snapshot dropped");
            if dismissed {
                self.render(now);
            }
            return;
        }

        let accepted = self.ctx.accept(snapshot);
        if accepted.new_question {
            self.begin_countdown(now);
        }
        self.schedule_round_timers(now);
        self.render(now);
        self.maybe_soft_start(accepted, now);
    }

    fn begin_countdown(&mut self, now: Timestamp) {
        let Some(snapshot) = self.ctx.last_snapshot() else {
            return;
        };
        let Some(round) = snapshot.round.clone() else {
            return;
        };
        let image = snapshot
            .question
            .as_ref()
            .and_then(|question| question.image.as_deref())
            .map(|image| self.image_url(image));
        let countdown_sec = round.countdown_or(self.config.default_countdown_sec);

        let mut effects = self.ctx.countdown.begin(round.started_at, countdown_sec, image, now);
        effects.extend(self.ctx.countdown.dismiss_if_live(&round, now));
        self.run_effects(effects);
    }

    fn schedule_round_timers(&mut self, now: Timestamp) {
        match self.ctx.last_snapshot().and_then(RoundSnapshot::pending_deadline) {
            Some(deadline) => {
                if self.ctx.timers.deadline.armed_for() != Some(deadline) {
                    self.ctx
                        .timers
                        .deadline
                        .arm(deadline, now, &self.events, EngineEvent::DeadlineDue);
                }
                self.schedule_polling(self.config.poll_interval);
            }
            None => {
                self.ctx.timers.deadline.disarm();
                self.schedule_polling(self.config.probe_interval);
            }
        }
    }

    fn schedule_polling(&mut self, cadence: Duration) {
        let timers = &mut self.ctx.timers;
        if timers.poll_cadence == Some(cadence) && timers.poll.is_armed() {
            return;
        }
        debug!(cadence_ms = cadence.as_millis() as u64, "sync: poll cadence set");
        timers.poll.arm_every(cadence, &self.events, EngineEvent::PollDue);
        timers.poll_cadence = Some(cadence);
    }

    /// Draws the last accepted snapshot. A running countdown owns the screen.
    fn render(&mut self, now: Timestamp) {
        if self.ctx.countdown.is_active() {
            self.ctx.timers.ticker.stop();
            return;
        }
        let Some(snapshot) = self.ctx.last_snapshot() else {
            return;
        };
        let screen = Screen::for_snapshot(snapshot);
        self.view
            .show_snapshot(snapshot, screen, self.ctx.answer_locked());

        let image = snapshot
            .question
            .as_ref()
            .and_then(|question| question.image.as_deref())
            .filter(|_| screen == Screen::Question)
            .map(|image| self.image_url(image));
        let deadline = snapshot.pending_deadline().filter(|_| screen == Screen::Question);
        let total_secs = f64::from(
            snapshot
                .timer_seconds
                .unwrap_or(self.config.default_timer_seconds),
        );

        if let Some(url) = image {
            self.apply_background(Background::Image(url));
        }
        match deadline {
            Some(deadline) => {
                let ticker = &mut self.ctx.timers.ticker;
                if ticker.start(deadline, total_secs, &self.events, EngineEvent::ProgressDue) {
                    if let Some(progress) = ticker.current(now) {
                        self.view.show_progress(progress);
                    }
                }
            }
            None => self.ctx.timers.ticker.stop(),
        }
    }

    fn maybe_soft_start(&mut self, accepted: Accepted, now: Timestamp) {
        if self.ctx.countdown.is_active() {
            return;
        }
        let Some(round) = self.ctx.last_snapshot().and_then(|snapshot| snapshot.round.as_ref()) else {
            return;
        };
        let Some(question_at) = round.question_at else {
            return;
        };
        let overlay = if accepted.was_waiting {
            Some(soft_start_on_switch(question_at, now))
        } else if accepted.first && !round.finished {
            soft_start_on_join(question_at, now)
        } else {
            None
        };
        if let Some(duration) = overlay {
            debug!(duration_ms = duration.as_millis() as u64, "sync: soft start");
            self.view.show_soft_start(duration);
        }
    }

    fn run_effects(&mut self, effects: Vec<CountdownEffect>) {
        for effect in effects {
            match effect {
                CountdownEffect::CancelTimers => self.ctx.timers.cancel_countdown(),
                CountdownEffect::ResetBackground => self.apply_background(Background::Default),
                CountdownEffect::ShowCountdown { seconds_left } => {
                    self.ctx.timers.ticker.stop();
                    self.view.show_countdown(seconds_left);
                }
                CountdownEffect::Preload { started_at, url } => self.preload(started_at, url, false),
                CountdownEffect::PreloadAndApply { started_at, url } => {
                    self.preload(started_at, url, true)
                }
                CountdownEffect::ScheduleTick { started_at, after } => {
                    self.ctx
                        .timers
                        .countdown_tick
                        .arm_after(after, &self.events, move |token| {
                            EngineEvent::CountdownTickDue { token, started_at }
                        });
                }
                CountdownEffect::SchedulePreloadCap { started_at, after } => {
                    self.ctx
                        .timers
                        .preload_cap
                        .arm_after(after, &self.events, move |token| {
                            EngineEvent::PreloadCapDue { token, started_at }
                        });
                }
                CountdownEffect::ScheduleFallback { started_at, after } => {
                    self.ctx
                        .timers
                        .fallback
                        .arm_after(after, &self.events, move |token| EngineEvent::FallbackDue {
                            token,
                            started_at,
                        });
                }
                CountdownEffect::ApplyBackground { url } => {
                    self.apply_background(Background::Image(url))
                }
                CountdownEffect::ApplyBackgroundDeferred { url } => {
                    self.ctx.timers.deferred_background.arm_after(
                        Duration::ZERO,
                        &self.events,
                        move |token| EngineEvent::DeferredBackgroundDue { token, url },
                    );
                }
                CountdownEffect::RoundReady => self.signal_round_ready(),
            }
        }
    }

    fn preload(&self, started_at: Timestamp, url: String, apply: bool) {
        let loader = Arc::clone(&self.loader);
        let events = self.events.clone();
        tokio::spawn(async move {
            let ok = loader.preload(&url).await;
            let event = if apply {
                EngineEvent::SkippedImageLoaded {
                    started_at,
                    url,
                    ok,
                }
            } else {
                EngineEvent::ImageLoaded { started_at, ok }
            };
            let _ = events.send(event);
        });
    }

    fn signal_round_ready(&mut self) {
        if self.ctx.is_live() {
            self.write(Mutation::RoundReady);
        }
    }

    fn apply_background(&mut self, background: Background) {
        if self.ctx.set_background(background.clone()) {
            self.view.set_background(&background);
        }
    }

    fn image_url(&self, image: &str) -> String {
        match &self.image_proxy {
            Some(server_url) => proxied_image_url(server_url, image).unwrap_or_else(|err| {
                warn!(image, error = %err, "sync: image proxy url rejected");
                image.to_string()
            }),
            None => image.to_string(),
        }
    }

    fn flag_read_failure(&mut self) {
        self.remote.indicator().read_failed();
        self.ctx.timers.badge.arm_after(
            self.config.connectivity_badge_ttl,
            &self.events,
            EngineEvent::BadgeExpired,
        );
    }

    fn clear_read_failure(&mut self) {
        if self.ctx.timers.badge.is_armed() {
            self.ctx.timers.badge.disarm();
            self.remote.indicator().read_recovered();
        }
    }

    fn submit_answer(&mut self, option: usize) {
        if !self.ctx.is_live() {
            return;
        }
        let now = self.clock.now();
        let user_id = self.session.user_id;
        let (answerable, already_answered) = match self.ctx.last_snapshot() {
            Some(snapshot) => (
                snapshot
                    .question
                    .as_ref()
                    .is_some_and(|question| option < question.options.len())
                    && snapshot
                        .round
                        .as_ref()
                        .is_some_and(|round| round.question_at.is_some() && !round.finished),
                snapshot.has_answered(user_id),
            ),
            None => (false, false),
        };
        if !answerable {
            self.view.show_failure("This question can't be answered now.");
            return;
        }
        if already_answered || !self.ctx.lock_answer() {
            info!(option, "sync: duplicate answer ignored");
            self.view.show_failure("Answer already submitted.");
            return;
        }
        self.render(now);
        self.write(Mutation::SubmitAnswer { option });
    }

    fn admin_write(&mut self, mutation: Mutation) {
        if !self.ctx.is_live() {
            debug!(op = mutation.kind(), "sync: admin action ignored, session ended");
            return;
        }
        self.write(mutation);
    }

    fn start_quiz(&mut self, timer_seconds: u32, rounds_total: u32) {
        if !self.ctx.is_live() {
            return;
        }
        info!(timer_seconds, rounds_total, "sync: starting quiz");
        let configure_mutation = Mutation::Configure {
            timer_seconds,
            rounds_total,
        };
        let start_mutation = Mutation::Start { timer_seconds };
        let configure = self.remote.submit(configure_mutation.clone());
        let start = self.remote.submit(start_mutation.clone());
        let epoch = self.ctx.epoch();
        let events = self.events.clone();
        tokio::spawn(async move {
            let (mutation, result) = match configure.await {
                Ok(_) => (start_mutation, start.await),
                Err(err) => (configure_mutation, Err(err)),
            };
            let _ = events.send(EngineEvent::WriteFinished {
                epoch,
                mutation,
                result,
            });
        });
    }

    fn write(&mut self, mutation: Mutation) {
        info!(op = mutation.kind(), "sync: write issued");
        let epoch = self.ctx.epoch();
        let submit = self.remote.submit(mutation.clone());
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = submit.await;
            let _ = events.send(EngineEvent::WriteFinished {
                epoch,
                mutation,
                result,
            });
        });
    }

    fn on_write_finished(&mut self, epoch: u64, mutation: Mutation, result: Result<Ack, SyncError>) {
        if epoch != self.ctx.epoch() {
            debug!(op = mutation.kind(), "sync: write result from previous session dropped");
            return;
        }
        match result {
            Ok(ack) => {
                info!(op = mutation.kind(), "sync: write acknowledged");
                match mutation {
                    Mutation::End => {
                        if self.ctx.is_live() {
                            self.end_session(ack.leaderboard);
                        }
                    }
                    Mutation::RematchJoin { .. } | Mutation::RematchLeave => {
                        self.load_rematch(RematchFetch::Panel)
                    }
                    Mutation::RematchStart => self.restart_session(),
                    _ => self.fetch(FetchMode::Hard),
                }
            }
            Err(err) => {
                warn!(op = mutation.kind(), error = %err, "sync: write failed");
                match mutation {
                    Mutation::SubmitAnswer { .. } => {
                        self.ctx.release_answer();
                        self.view
                            .show_failure(&format!("Could not submit answer: {err}"));
                        self.render(self.clock.now());
                    }
                    Mutation::RoundReady => self.fetch(FetchMode::Hard),
                    other => self
                        .view
                        .show_failure(&format!("{} failed: {err}", other.kind())),
                }
            }
        }
    }

    /// Terminal transition: stops everything session-scoped, then shows the
    /// final board and starts watching the rematch lobby.
    fn end_session(&mut self, leaderboard: Vec<LeaderboardEntry>) {
        self.ctx.end();
        self.remote.cancel_read();
        self.apply_background(Background::Default);
        if leaderboard.is_empty() {
            self.load_rematch(RematchFetch::Board);
        } else {
            self.view.show_final_board(&leaderboard);
            self.ctx
                .timers
                .rematch
                .start(&self.events, EngineEvent::RematchDue);
            self.load_rematch(RematchFetch::Panel);
        }
    }

    fn load_rematch(&self, purpose: RematchFetch) {
        let epoch = self.ctx.epoch();
        let read = self.remote.rematch_state();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = read.await;
            let _ = events.send(EngineEvent::RematchLoaded {
                epoch,
                purpose,
                result,
            });
        });
    }

    fn on_rematch_loaded(
        &mut self,
        epoch: u64,
        purpose: RematchFetch,
        result: Result<RematchState, SyncError>,
    ) {
        if epoch != self.ctx.epoch() || self.ctx.is_live() {
            debug!(?purpose, "sync: stale rematch state dropped");
            return;
        }
        match result {
            Ok(state) if state.ok => {
                if purpose == RematchFetch::Board {
                    self.view.show_final_board(&state.leaderboard);
                    self.ctx
                        .timers
                        .rematch
                        .start(&self.events, EngineEvent::RematchDue);
                }
                let panel = self.ctx.timers.rematch.record(state, self.session.user_id);
                self.view.show_rematch(&panel);
                if purpose == RematchFetch::Toggle {
                    let mutation = if panel.joined {
                        Mutation::RematchLeave
                    } else {
                        Mutation::RematchJoin {
                            name: self.display_name.clone(),
                        }
                    };
                    self.write(mutation);
                }
            }
            Ok(_) => self.rematch_unavailable(purpose),
            Err(err) => {
                warn!(?purpose, error = %err, "sync: rematch state read failed");
                self.rematch_unavailable(purpose);
            }
        }
    }

    fn rematch_unavailable(&mut self, purpose: RematchFetch) {
        match purpose {
            RematchFetch::Board => self.view.show_message("Quiz finished."),
            RematchFetch::Toggle => self.view.show_failure("Rematch is not available."),
            RematchFetch::Panel => {}
        }
    }

    fn toggle_rematch(&mut self) {
        if !self.ctx.is_live() {
            self.load_rematch(RematchFetch::Toggle);
        }
    }

    fn start_rematch(&mut self) {
        if self.ctx.is_live() {
            return;
        }
        let user_id = self.session.user_id;
        let (is_admin, can_start) = self
            .ctx
            .timers
            .rematch
            .last()
            .map(|state| (state.is_admin(user_id), state.can_start()))
            .unwrap_or_default();
        if !is_admin {
            self.view.show_failure("Only the admin can start a new game.");
        } else if !can_start {
            self.view.show_failure("Nobody has confirmed yet.");
        } else {
            self.write(Mutation::RematchStart);
        }
    }

    fn restart_session(&mut self) {
        self.ctx.reset();
        self.remote.cancel_read();
        self.apply_background(Background::Default);
        self.view.show_message("Starting a new game...");
        self.fetch(FetchMode::Hard);
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
