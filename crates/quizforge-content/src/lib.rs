//! Quiz content for Quizforge.
//!
//! A [`Package`] is the immutable tree a game is played over:
//!
//! ```text
//! Package ─┬─ Round ─┬─ Theme ─┬─ Question (price, scene, answer)
//!          │         │         └─ Question ...
//!          │         └─ Theme ...
//!          └─ Round ...
//! ```
//!
//! The package itself never changes during a game. Which questions have
//! been played is tracked separately by a [`Board`], so one package can be
//! shared (`Arc<Package>`) between any number of concurrent sessions.

mod board;
mod error;
mod package;

pub use board::{Board, QuestionKey, QuestionView, ThemeView};
pub use error::ContentError;
pub use package::{Atom, AtomKind, Package, Question, Round, Theme};
