//! Per-session play state over a shared [`Package`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::{ContentError, Package, Question, Round};

/// Addresses one question: round by position, theme and question by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionKey {
    /// 0-based round position in the package.
    pub round: usize,
    pub theme: u32,
    pub question: u32,
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {} theme {} question {}", self.round + 1, self.theme, self.question)
    }
}

/// A theme as players see it: ids, names, prices, availability. No answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeView {
    pub id: u32,
    pub name: String,
    pub questions: Vec<QuestionView>,
}

/// One cell of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: u32,
    pub price: u32,
    pub available: bool,
}

/// Tracks which questions have been played.
///
/// A taken question leaves the selectable pool for good, but it stays in
/// the package, so its price and answer remain readable for scoring and
/// the reveal.
#[derive(Debug, Clone)]
pub struct Board {
    package: Arc<Package>,
    taken: HashSet<QuestionKey>,
}

impl Board {
    pub fn new(package: Arc<Package>) -> Self {
        Self {
            package,
            taken: HashSet::new(),
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn round_count(&self) -> usize {
        self.package.rounds.len()
    }

    pub fn round(&self, round: usize) -> Option<&Round> {
        self.package.rounds.get(round)
    }

    /// Looks up a question without regard to availability.
    pub fn find(&self, key: QuestionKey) -> Option<&Question> {
        self.round(key.round)?
            .themes
            .iter()
            .find(|t| t.id == key.theme)?
            .questions
            .iter()
            .find(|q| q.id == key.question)
    }

    /// `true` if the question exists and has not been taken.
    pub fn is_available(&self, key: QuestionKey) -> bool {
        self.find(key).is_some() && !self.taken.contains(&key)
    }

    /// Removes a question from the pool and returns it.
    ///
    /// Fails without changing anything if the question does not exist or
    /// was taken before.
    pub fn take(&mut self, key: QuestionKey) -> Result<&Question, ContentError> {
        if self.find(key).is_none() {
            return Err(ContentError::NotFound(key));
        }
        if !self.taken.insert(key) {
            return Err(ContentError::AlreadyTaken(key));
        }
        self.find(key).ok_or(ContentError::NotFound(key))
    }

    /// The first untaken question of a round, in theme then question order.
    pub fn first_available(&self, round: usize) -> Option<QuestionKey> {
        let r = self.round(round)?;
        r.themes.iter().find_map(|theme| {
            theme.questions.iter().find_map(|q| {
                let key = QuestionKey {
                    round,
                    theme: theme.id,
                    question: q.id,
                };
                self.is_available(key).then_some(key)
            })
        })
    }

    pub fn has_available(&self, round: usize) -> bool {
        self.first_available(round).is_some()
    }

    /// Number of questions taken so far, across all rounds.
    pub fn taken_count(&self) -> usize {
        self.taken.len()
    }

    /// The round's board as players see it.
    pub fn view(&self, round: usize) -> Vec<ThemeView> {
        let Some(r) = self.round(round) else {
            return Vec::new();
        };
        r.themes
            .iter()
            .map(|theme| ThemeView {
                id: theme.id,
                name: theme.name.clone(),
                questions: theme
                    .questions
                    .iter()
                    .map(|q| QuestionView {
                        id: q.id,
                        price: q.price,
                        available: self.is_available(QuestionKey {
                            round,
                            theme: theme.id,
                            question: q.id,
                        }),
                    })
                    .collect(),
            })
            .collect()
    }
}
