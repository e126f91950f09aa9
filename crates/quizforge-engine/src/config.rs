//! Engine timings and the game step state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

/// How long each timed step lasts.
///
/// Serialized as whole seconds, so a config file reads `choose = 10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// How long a session may sit in the lobby before it is closed.
    #[serde(with = "secs")]
    pub lobby_idle: Duration,

    /// Greeting before the first round, and the interlude between rounds.
    #[serde(with = "secs")]
    pub greeting: Duration,

    /// Announcement of a round's name.
    #[serde(with = "secs")]
    pub round_intro: Duration,

    /// Reading time per theme. The themes step lasts this times the
    /// number of themes in the round.
    #[serde(with = "secs")]
    pub per_theme: Duration,

    /// Time the turn holder has to pick a question.
    #[serde(with = "secs")]
    pub choose: Duration,

    /// Time players have to claim a shown question.
    #[serde(with = "secs")]
    pub buzz: Duration,

    /// Time the leader has to judge an answer.
    #[serde(with = "secs")]
    pub answer: Duration,

    /// How long the final scoreboard stays up before the session closes.
    #[serde(with = "secs")]
    pub final_display: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            lobby_idle: Duration::from_secs(5 * 60),
            greeting: Duration::from_secs(5),
            round_intro: Duration::from_secs(4),
            per_theme: Duration::from_secs(3),
            choose: Duration::from_secs(10),
            buzz: Duration::from_secs(10),
            answer: Duration::from_secs(20),
            final_display: Duration::from_secs(5 * 60),
        }
    }
}

impl Timings {
    /// Duration of the themes step for a round with `themes` themes.
    pub fn reading_themes(&self, themes: usize) -> Duration {
        self.per_theme * themes.max(1) as u32
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Where a game currently is.
///
/// ```text
/// WaitingStart → Greeting → ReadingRound → ReadingThemes → ChooseQuestion
///                   ↑                                          ↓      ↑
///                   │                                       Getting   │
///                   │                                          ↓      │
///                   └──────── (round exhausted) ──────── Answering ───┘
///                                                              ↓
///                                                            Final → Closed
/// ```
///
/// - **WaitingStart**: lobby. Participants join, the leader starts.
/// - **Greeting**: package greeting, or the pause after a round.
/// - **ReadingRound** / **ReadingThemes**: round name, then its themes.
/// - **ChooseQuestion**: the turn holder picks a question.
/// - **Getting**: the question is shown, players race to claim it.
/// - **Answering**: the claimer answers, the leader judges.
/// - **Final**: scoreboard and winner.
/// - **Closed**: the session has been told to shut down. Nothing happens
///   after this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    WaitingStart,
    Greeting,
    ReadingRound,
    ReadingThemes,
    ChooseQuestion,
    Getting,
    Answering,
    Final,
    Closed,
}

impl Step {
    /// Steps in which the board is shown.
    pub fn shows_board(self) -> bool {
        matches!(self, Self::ChooseQuestion | Self::Getting | Self::Answering)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::WaitingStart => "WaitingStart",
            Self::Greeting => "Greeting",
            Self::ReadingRound => "ReadingRound",
            Self::ReadingThemes => "ReadingThemes",
            Self::ChooseQuestion => "ChooseQuestion",
            Self::Getting => "Getting",
            Self::Answering => "Answering",
            Self::Final => "Final",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}
