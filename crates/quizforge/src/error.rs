//! Unified error type for Quizforge.

use quizforge_content::ContentError;
use quizforge_hub::HubError;
use quizforge_protocol::ProtocolError;
use quizforge_session::SessionError;
use quizforge_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizforgeError {
    /// A transport-level error (bind, upgrade, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A bearer credential was refused.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A session registry operation failed.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A quiz package is malformed.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// The configuration file is unreadable or inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The client did not finish the handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}
