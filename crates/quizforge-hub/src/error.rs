//! Error types for the session registry.

use quizforge_engine::EngineError;
use quizforge_protocol::SessionId;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No session with this id exists.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Every player slot is taken.
    #[error("session {0} is full")]
    Full(SessionId),

    /// The session's command channel is closed. It is shutting down or gone.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),

    /// The session's engine rejected an action.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
