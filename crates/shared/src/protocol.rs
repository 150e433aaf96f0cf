use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, Role, SessionKey, UserId},
    error::SnapshotError,
};

/// Seconds since the Unix epoch, as reported by the quiz authority.
pub type Timestamp = f64;

/// Server-authoritative description of one quiz session, as returned by the
/// state endpoint. Deserialization validates the payload; a snapshot that
/// exists is structurally sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct RoundSnapshot {
    pub ok: bool,
    pub ended: bool,
    pub role: Role,
    #[serde(rename = "rev")]
    pub revision: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds_total: Option<u32>,
    pub round: Option<RoundInfo>,
    pub question: Option<QuestionInfo>,
    pub players: BTreeMap<String, PlayerStatus>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub scores: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub started_at: Timestamp,
    #[serde(default)]
    pub question_at: Option<Timestamp>,
    #[serde(default)]
    pub deadline: Option<Timestamp>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub countdown_sec: Option<f64>,
}

impl RoundInfo {
    pub fn countdown_or(&self, fallback: f64) -> f64 {
        self.countdown_sec.filter(|sec| *sec > 0.0).unwrap_or(fallback)
    }

    /// The only authoritative end of the pre-question countdown.
    pub fn countdown_end(&self, fallback: f64) -> Timestamp {
        self.started_at + self.countdown_or(fallback)
    }

    /// Started, but the authority has not opened the question phase yet.
    pub fn is_waiting(&self) -> bool {
        self.question_at.is_none() && !self.finished
    }

    pub fn question_live(&self, now: Timestamp) -> bool {
        self.finished || self.question_at.is_some_and(|at| now >= at)
    }

    /// Deadline of a round that is still running.
    pub fn pending_deadline(&self) -> Option<Timestamp> {
        if self.finished {
            None
        } else {
            self.deadline
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionInfo {
    #[serde(rename = "question", alias = "text")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub name: String,
    #[serde(default)]
    pub answered: bool,
}

impl RoundSnapshot {
    pub fn started_at(&self) -> Option<Timestamp> {
        self.round.as_ref().map(|round| round.started_at)
    }

    pub fn player(&self, user_id: UserId) -> Option<&PlayerStatus> {
        self.players.get(&user_id.to_string())
    }

    pub fn has_answered(&self, user_id: UserId) -> bool {
        self.player(user_id).is_some_and(|player| player.answered)
    }

    pub fn answered_count(&self) -> usize {
        self.players.values().filter(|player| player.answered).count()
    }

    pub fn pending_deadline(&self) -> Option<Timestamp> {
        self.round.as_ref().and_then(RoundInfo::pending_deadline)
    }

    /// The correct option, once the round is finished and the authority
    /// disclosed it.
    pub fn revealed_answer(&self) -> Option<usize> {
        let finished = self.round.as_ref().is_some_and(|round| round.finished);
        if finished {
            self.question.as_ref().and_then(|question| question.answer)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ended: bool,
    #[serde(default)]
    role: Role,
    #[serde(default, alias = "revision")]
    rev: Option<i64>,
    #[serde(default)]
    timer_seconds: Option<u32>,
    #[serde(default)]
    rounds_total: Option<u32>,
    #[serde(default)]
    round: Option<RoundInfo>,
    #[serde(default)]
    question: Option<QuestionInfo>,
    #[serde(default)]
    players: BTreeMap<String, PlayerStatus>,
    #[serde(default)]
    scores: BTreeMap<String, i64>,
}

impl TryFrom<RawSnapshot> for RoundSnapshot {
    type Error = SnapshotError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        // Envelopes for ended or unknown sessions carry no round state.
        let live = raw.ok && !raw.ended;
        let revision = match raw.rev {
            Some(rev) if rev < 0 => return Err(SnapshotError::NegativeRevision(rev)),
            Some(rev) => rev,
            None if live => return Err(SnapshotError::MissingField("rev")),
            None => 0,
        };

        if let Some(round) = &raw.round {
            validate_round(round)?;
        }
        if let Some(question) = &raw.question {
            validate_question(question)?;
        }

        Ok(Self {
            ok: raw.ok,
            ended: raw.ended,
            role: raw.role,
            revision,
            timer_seconds: raw.timer_seconds,
            rounds_total: raw.rounds_total,
            round: raw.round,
            question: raw.question,
            players: raw.players,
            scores: raw.scores,
        })
    }
}

fn validate_round(round: &RoundInfo) -> Result<(), SnapshotError> {
    if !round.started_at.is_finite() {
        return Err(SnapshotError::NonFiniteTimestamp("started_at"));
    }
    if round.question_at.is_some_and(|at| !at.is_finite()) {
        return Err(SnapshotError::NonFiniteTimestamp("question_at"));
    }
    if round.deadline.is_some_and(|at| !at.is_finite()) {
        return Err(SnapshotError::NonFiniteTimestamp("deadline"));
    }
    match round.countdown_sec {
        Some(sec) if !sec.is_finite() || sec < 0.0 => Err(SnapshotError::InvalidCountdown(sec)),
        _ => Ok(()),
    }
}

fn validate_question(question: &QuestionInfo) -> Result<(), SnapshotError> {
    if question.options.is_empty() {
        return Err(SnapshotError::NoOptions);
    }
    match question.answer {
        Some(index) if index >= question.options.len() => Err(SnapshotError::AnswerOutOfRange {
            index,
            options: question.options.len(),
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i64,
    #[serde(default)]
    pub total_time: f64,
}

/// Lobby state after a session ended: who confirmed another game.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RematchState {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub confirmed: BTreeMap<String, String>,
    #[serde(default)]
    pub admin_id: Option<UserId>,
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl RematchState {
    pub fn is_confirmed(&self, user_id: UserId) -> bool {
        self.confirmed.contains_key(&user_id.to_string())
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_id == Some(user_id)
    }

    pub fn confirmed_names(&self) -> Vec<&str> {
        self.confirmed.values().map(String::as_str).collect()
    }

    pub fn can_start(&self) -> bool {
        !self.confirmed.is_empty()
    }
}

/// Reply to every write endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            leaderboard: Vec::new(),
        }
    }
}

/// Query string shared by the read endpoints.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionQuery {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl From<SessionKey> for SessionQuery {
    fn from(key: SessionKey) -> Self {
        Self {
            chat_id: key.chat_id,
            user_id: key.user_id,
        }
    }
}

/// Every state-changing action the client can ask of the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SubmitAnswer { option: usize },
    Configure { timer_seconds: u32, rounds_total: u32 },
    Start { timer_seconds: u32 },
    Next,
    ForceStart,
    End,
    RoundReady,
    RematchJoin { name: String },
    RematchLeave,
    RematchStart,
}

impl Mutation {
    pub fn path(&self) -> &'static str {
        match self {
            Mutation::SubmitAnswer { .. } => "api/submit",
            Mutation::Configure { .. } => "api/admin/config",
            Mutation::Start { .. } => "api/admin/start",
            Mutation::Next => "api/admin/next",
            Mutation::ForceStart => "api/admin/force_start",
            Mutation::End => "api/admin/end",
            Mutation::RoundReady => "api/round/ready",
            Mutation::RematchJoin { .. } => "api/rematch/join",
            Mutation::RematchLeave => "api/rematch/leave",
            Mutation::RematchStart => "api/rematch/start",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::SubmitAnswer { .. } => "submit_answer",
            Mutation::Configure { .. } => "admin_config",
            Mutation::Start { .. } => "admin_start",
            Mutation::Next => "admin_next",
            Mutation::ForceStart => "admin_force_start",
            Mutation::End => "admin_end",
            Mutation::RoundReady => "round_ready",
            Mutation::RematchJoin { .. } => "rematch_join",
            Mutation::RematchLeave => "rematch_leave",
            Mutation::RematchStart => "rematch_start",
        }
    }

    pub fn request(&self, key: SessionKey) -> MutationRequest {
        let SessionKey { chat_id, user_id } = key;
        match self {
            Mutation::SubmitAnswer { option } => MutationRequest::Submit {
                chat_id,
                user: UserRef { id: user_id },
                given: *option,
            },
            Mutation::Configure {
                timer_seconds,
                rounds_total,
            } => MutationRequest::Configure {
                chat_id,
                user_id,
                timer_seconds: *timer_seconds,
                rounds_total: *rounds_total,
            },
            Mutation::Start { timer_seconds } => MutationRequest::Start {
                chat_id,
                user_id,
                timer_seconds: *timer_seconds,
            },
            Mutation::RematchJoin { name } => MutationRequest::Named {
                chat_id,
                user_id,
                name: name.clone(),
            },
            Mutation::Next
            | Mutation::ForceStart
            | Mutation::End
            | Mutation::RoundReady
            | Mutation::RematchLeave
            | Mutation::RematchStart => MutationRequest::Session { chat_id, user_id },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
}

/// JSON body of a write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MutationRequest {
    Submit {
        chat_id: ChatId,
        user: UserRef,
        given: usize,
    },
    Configure {
        chat_id: ChatId,
        user_id: UserId,
        timer_seconds: u32,
        rounds_total: u32,
    },
    Start {
        chat_id: ChatId,
        user_id: UserId,
        timer_seconds: u32,
    },
    Named {
        chat_id: ChatId,
        user_id: UserId,
        name: String,
    },
    Session {
        chat_id: ChatId,
        user_id: UserId,
    },
}
