//! Game engine for Quizforge.
//!
//! One engine per session. It owns the package board, the roster and the
//! current [`Step`], and is the only place game rules live.
//!
//! - [`Game`]: the pure transition function, `(input, now) → Outcome`
//! - [`Roster`]: turn order and scores
//! - [`Timings`]: per-step durations
//! - [`spawn_engine`] / [`EngineHandle`]: the actor wrapping a `Game`
//!
//! # Example
//!
//! ```ignore
//! let (dispatch_tx, dispatch_rx) = tokio::sync::mpsc::unbounded_channel();
//! let game = Game::new(package, leader_id, Timings::default());
//! let (engine, task) = spawn_engine(session_id, game, dispatch_tx, 256);
//! engine.submit(ClientAction::membership(ActionKind::Join, identity, Role::Player)).await?;
//! ```

mod actor;
mod config;
mod error;
mod game;
mod roster;

pub use actor::{EngineHandle, spawn_engine};
pub use config::{Step, Timings};
pub use error::EngineError;
pub use game::{Game, Input, Outcome, TimerChange};
pub use roster::{Player, Roster};
