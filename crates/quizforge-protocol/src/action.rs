//! Client → server messages.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Identity, ProtocolError, Role, SessionId};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Every input the game engine accepts from participants.
///
/// `Join` and `Disconnect` are produced by the session registry when
/// membership changes. They travel the same queue as player actions (so
/// the engine sees one total order of events) but a client may never send
/// them itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Join,
    Disconnect,
    StartGame,
    ChooseQuest,
    GetQuest,
    GiveAnswer,
    AcceptAnswer,
    DeclineAnswer,
}

impl ActionKind {
    /// Parses a kind a client is allowed to send.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "start_game" => Some(Self::StartGame),
            "choose_quest" => Some(Self::ChooseQuest),
            "get_quest" => Some(Self::GetQuest),
            "give_answer" => Some(Self::GiveAnswer),
            "accept_answer" => Some(Self::AcceptAnswer),
            "decline_answer" => Some(Self::DeclineAnswer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Disconnect => "disconnect",
            Self::StartGame => "start_game",
            Self::ChooseQuest => "choose_quest",
            Self::GetQuest => "get_quest",
            Self::GiveAnswer => "give_answer",
            Self::AcceptAnswer => "accept_answer",
            Self::DeclineAnswer => "decline_answer",
        }
    }

    /// The role table: which roles may perform this action.
    ///
    /// | action                                        | roles          |
    /// |-----------------------------------------------|----------------|
    /// | join, disconnect                              | leader, player |
    /// | start_game, accept_answer, decline_answer     | leader         |
    /// | choose_quest, get_quest, give_answer          | player         |
    pub fn permits(self, role: Role) -> bool {
        match self {
            Self::Join | Self::Disconnect => true,
            Self::StartGame | Self::AcceptAnswer | Self::DeclineAnswer => role == Role::Leader,
            Self::ChooseQuest | Self::GetQuest | Self::GiveAnswer => role == Role::Player,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// The outer shape of every client frame: `{"type": ..., "data": ...}`.
///
/// `data` stays untyped here. Its shape depends on `type`, and is only
/// checked by whoever handles that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ClientEnvelope {
    /// Resolves the envelope's kind to a client-sendable [`ActionKind`].
    pub fn action_kind(&self) -> Result<ActionKind, ProtocolError> {
        if self.kind.is_empty() {
            return Err(ProtocolError::EmptyKind);
        }
        ActionKind::from_wire(&self.kind).ok_or_else(|| ProtocolError::UnknownKind(self.kind.clone()))
    }
}

/// An action as the engine receives it: what, from whom, with which role.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientAction {
    pub kind: ActionKind,
    pub actor: Identity,
    pub role: Role,
    pub payload: serde_json::Value,
}

impl ClientAction {
    /// Builds a membership action (no payload).
    pub fn membership(kind: ActionKind, actor: Identity, role: Role) -> Self {
        Self {
            kind,
            actor,
            role,
            payload: serde_json::Value::Null,
        }
    }

    /// Decodes the payload as the body expected for this kind.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Action bodies
// ---------------------------------------------------------------------------

/// Body of `choose_quest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChooseQuest {
    pub theme_id: u32,
    pub question_id: u32,
}

/// Body of `give_answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveAnswer {
    pub text: String,
}

// ---------------------------------------------------------------------------
// Connect handshake
// ---------------------------------------------------------------------------

/// Body of the `create` handshake frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSession {
    pub name: String,
    pub password: String,
    pub max_players: u32,
    pub pack_id: String,
}

/// Body of the `join` handshake frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSession {
    pub hub_id: SessionId,
}
