//! Server → client messages and engine output.

use quizforge_content::{Atom, ThemeView};
use serde::Serialize;

use crate::{PlayerId, Recipient, Role, SessionId};

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// A private error message for one participant.
///
/// `code` follows HTTP conventions: 400 bad request, 401 bad credential,
/// 403 wrong role or turn, 404 unknown target, 409 conflicting state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub code: u16,
    pub message: String,
}

impl Notice {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }
}

/// Notice texts clients can match on.
pub mod notices {
    pub const INCORRECT_DATA: &str = "incorrect data";
    pub const INCORRECT_EVENT_TYPE: &str = "incorrect event type";
    pub const UNKNOWN_ACTION: &str = "unknown action kind";
    pub const PERMISSION_DENIED: &str = "permission denied";
    pub const TOKEN_EXPIRED: &str = "token expired";
    pub const TOKEN_INVALID: &str = "token parse error";
    pub const NOT_ENOUGH_PLAYERS: &str = "not enough players";
    pub const ALREADY_STARTED: &str = "game already started";
    pub const NOT_YOUR_TURN: &str = "not your turn";
    pub const QUESTION_NOT_FOUND: &str = "question not found";
    pub const QUESTION_TAKEN: &str = "question already taken";
    pub const QUESTION_CLAIMED: &str = "question already claimed";
    pub const NOT_ANSWERER: &str = "you are not answering";
    pub const NOT_ALLOWED_NOW: &str = "action not allowed now";
    pub const GAME_OVER: &str = "game is over";
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

/// One line of a scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: i64,
}

/// Everything the server can tell a client.
///
/// `#[serde(tag = "type", content = "data")]` is serde's "adjacently
/// tagged" layout, which gives exactly the envelope clients expect:
///
/// ```text
/// { "type": "taken_quest_server", "data": { "player_id": 4 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EventBody {
    /// Handshake accepted. Sent once, before registration.
    #[serde(rename = "connected_server")]
    Connected {
        hub_id: SessionId,
        player_id: PlayerId,
        role: Role,
    },

    #[serde(rename = "join_server")]
    Joined {
        player_id: PlayerId,
        nickname: String,
        role: Role,
    },

    #[serde(rename = "disconnect_server")]
    Left { player_id: PlayerId },

    #[serde(rename = "greetings_server")]
    Greetings {
        name: String,
        author: String,
        date: String,
    },

    #[serde(rename = "reading_round")]
    ReadingRound { round_id: u32, name: String },

    #[serde(rename = "reading_themes_server")]
    ReadingThemes { themes: Vec<String> },

    /// The board of the current round.
    #[serde(rename = "wall_server")]
    Wall { round_id: u32, themes: Vec<ThemeView> },

    /// Who chooses the next question.
    #[serde(rename = "turn_server")]
    Turn { player_id: PlayerId },

    #[serde(rename = "choose_quest_server")]
    QuestionChosen {
        theme_id: u32,
        question_id: u32,
        price: u32,
    },

    /// The question's scene, without its answer.
    #[serde(rename = "question_server")]
    Question {
        theme_id: u32,
        question_id: u32,
        scene: Vec<Atom>,
    },

    /// The accepted answers. Leader only until the question resolves.
    #[serde(rename = "answer_server")]
    Answer {
        theme_id: u32,
        question_id: u32,
        answer: Vec<String>,
    },

    #[serde(rename = "taken_quest_server")]
    TakenQuest { player_id: PlayerId },

    #[serde(rename = "answer_given_server")]
    AnswerGiven { player_id: PlayerId, text: String },

    #[serde(rename = "answer_accepted_server")]
    AnswerAccepted { player_id: PlayerId, price: u32 },

    #[serde(rename = "answer_declined_server")]
    AnswerDeclined { player_id: PlayerId, price: u32 },

    #[serde(rename = "score_changed")]
    ScoreChanged { player_id: PlayerId, score: i64 },

    /// The answer, shown to everyone once the question is resolved.
    #[serde(rename = "answer_reveal_server")]
    AnswerReveal {
        theme_id: u32,
        question_id: u32,
        answer: Vec<String>,
    },

    #[serde(rename = "round_over_server")]
    RoundOver {
        round_id: u32,
        scores: Vec<ScoreEntry>,
    },

    #[serde(rename = "final_server")]
    Final {
        winner_id: Option<PlayerId>,
        scores: Vec<ScoreEntry>,
    },

    #[serde(rename = "error")]
    Error(Notice),
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// The top-level server frame: `{"type", "exp", "data"}`.
///
/// `exp` is the unix-seconds deadline of the step the event belongs to, so
/// clients can draw countdowns, or `0` when nothing is pending.
/// `#[serde(flatten)]` merges the body's `type`/`data` keys into this
/// struct's object instead of nesting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerEvent {
    #[serde(flatten)]
    pub body: EventBody,
    pub exp: i64,
}

impl ServerEvent {
    /// An event with no deadline.
    pub fn new(body: EventBody) -> Self {
        Self { body, exp: 0 }
    }

    /// An event whose step ends at `exp` (unix seconds).
    pub fn with_deadline(body: EventBody, exp: i64) -> Self {
        Self { body, exp }
    }

    pub fn notice(notice: Notice) -> Self {
        Self::new(EventBody::Error(notice))
    }

    /// The wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match &self.body {
            EventBody::Connected { .. } => "connected_server",
            EventBody::Joined { .. } => "join_server",
            EventBody::Left { .. } => "disconnect_server",
            EventBody::Greetings { .. } => "greetings_server",
            EventBody::ReadingRound { .. } => "reading_round",
            EventBody::ReadingThemes { .. } => "reading_themes_server",
            EventBody::Wall { .. } => "wall_server",
            EventBody::Turn { .. } => "turn_server",
            EventBody::QuestionChosen { .. } => "choose_quest_server",
            EventBody::Question { .. } => "question_server",
            EventBody::Answer { .. } => "answer_server",
            EventBody::TakenQuest { .. } => "taken_quest_server",
            EventBody::AnswerGiven { .. } => "answer_given_server",
            EventBody::AnswerAccepted { .. } => "answer_accepted_server",
            EventBody::AnswerDeclined { .. } => "answer_declined_server",
            EventBody::ScoreChanged { .. } => "score_changed",
            EventBody::AnswerReveal { .. } => "answer_reveal_server",
            EventBody::RoundOver { .. } => "round_over_server",
            EventBody::Final { .. } => "final_server",
            EventBody::Error(_) => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// What the engine asks the session registry to do.
///
/// The engine performs no I/O. Every effect it wants leaves as one of
/// these, addressed by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Deliver an event to the addressed participants.
    Send { to: Recipient, event: ServerEvent },
    /// Deliver a private notice to one participant.
    Notify { player: PlayerId, notice: Notice },
    /// Deliver a notice, then drop the participant's connection.
    ///
    /// `expired_at` is the expiry of the credential that triggered the
    /// eviction. A registration holding a credential that expires later
    /// has reconnected since and is left alone.
    Evict {
        player: PlayerId,
        expired_at: i64,
        notice: Notice,
    },
    /// End the session: drop every connection and stop.
    Shutdown,
}

impl Dispatch {
    pub fn to_all(event: ServerEvent) -> Self {
        Self::Send {
            to: Recipient::All,
            event,
        }
    }

    pub fn to_player(player: PlayerId, event: ServerEvent) -> Self {
        Self::Send {
            to: Recipient::Player(player),
            event,
        }
    }

    pub fn notify(player: PlayerId, notice: Notice) -> Self {
        Self::Notify { player, notice }
    }
}
