//! Error types for the engine layer.

use quizforge_protocol::SessionId;

/// Errors from talking to an engine actor.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine task has stopped and no longer accepts actions.
    #[error("engine for session {0} has stopped")]
    Closed(SessionId),

    /// The engine's action queue is full.
    #[error("engine for session {0} is busy")]
    Busy(SessionId),
}
