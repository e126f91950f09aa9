//! The content tree and its validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ContentError;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A complete quiz pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub author: String,
    /// Free-form publication date, shown in the greeting.
    #[serde(default)]
    pub date: String,
    pub rounds: Vec<Round>,
}

/// One round: a set of themes played before moving on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: u32,
    pub name: String,
    pub themes: Vec<Theme>,
}

/// A column of questions on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: u32,
    pub name: String,
    pub questions: Vec<Question>,
}

/// A single question.
///
/// `answer` holds the accepted phrasings. It is only ever shown to the
/// leader until the question is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub price: u32,
    #[serde(default)]
    pub scene: Vec<Atom>,
    #[serde(default)]
    pub answer: Vec<String>,
}

/// One piece of a question's scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub kind: AtomKind,
    /// Text body, or a media reference for the other kinds.
    pub content: String,
}

/// Media kind of an [`Atom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    Text,
    Image,
    Audio,
    Video,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Package {
    /// Parses a JSON package document and validates it.
    pub fn from_json(text: &str) -> Result<Self, ContentError> {
        let package: Package = serde_json::from_str(text)?;
        package.validate()?;
        Ok(package)
    }

    /// Checks the structural rules every package must satisfy:
    ///
    /// - at least one round, and every round has at least one question
    /// - ids are positive and unique among their siblings
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.rounds.is_empty() {
            return Err(ContentError::EmptyPackage);
        }
        check_ids("round", self.rounds.iter().map(|r| r.id))?;

        for round in &self.rounds {
            check_ids("theme", round.themes.iter().map(|t| t.id))?;
            let mut total = 0;
            for theme in &round.themes {
                check_ids("question", theme.questions.iter().map(|q| q.id))?;
                total += theme.questions.len();
            }
            if total == 0 {
                return Err(ContentError::EmptyRound(round.id));
            }
        }
        Ok(())
    }

    /// Total number of questions across all rounds.
    pub fn question_count(&self) -> usize {
        self.rounds
            .iter()
            .flat_map(|r| &r.themes)
            .map(|t| t.questions.len())
            .sum()
    }
}

fn check_ids(kind: &'static str, ids: impl Iterator<Item = u32>) -> Result<(), ContentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id == 0 {
            return Err(ContentError::ZeroId { kind });
        }
        if !seen.insert(id) {
            return Err(ContentError::DuplicateId { kind, id });
        }
    }
    Ok(())
}
