//! Identity types shared by every layer.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player, taken from the verified credential.
///
/// This is a "newtype wrapper": a `u64` in a named struct, so a
/// `SessionId` can never be passed where a `PlayerId` is expected.
///
/// `#[serde(transparent)]` serializes it as the bare number, so
/// `PlayerId(42)` is `42` on the wire, not `{"0":42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a session (one running game instance).
///
/// This is the `hub_id` clients pass when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What a participant may do in a session.
///
/// The leader creates the session, starts the game and judges answers.
/// Players pick and answer questions. The leader does not hold a place in
/// the turn order and never scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Leader,
    Player,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => write!(f, "leader"),
            Self::Player => write!(f, "player"),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The verified claims of a bearer credential.
///
/// Produced by an authenticator and attached to every action the
/// participant sends, so the engine can reject actions from credentials
/// that have run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    /// Display name shown to other participants.
    pub login: String,
    /// Unix seconds after which the credential is no longer valid.
    pub expires_at: i64,
}

impl Identity {
    /// `true` once `now` (unix seconds) has reached the expiry.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// The engine never holds connections. It names recipients by identity and
/// the session registry resolves them to live connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every registered participant, leader included.
    All,
    /// One specific participant.
    Player(PlayerId),
}

impl Recipient {
    /// `true` if a participant with this id is addressed.
    pub fn includes(&self, player: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Player(p) => *p == player,
        }
    }
}
