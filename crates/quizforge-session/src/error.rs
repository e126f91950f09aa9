//! Error types for credential verification.

use quizforge_protocol::{Notice, notices};

/// Why a bearer credential was refused.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No credential was presented.
    #[error("access token is empty")]
    MissingToken,

    /// The credential is malformed, has a bad signature, or lacks claims.
    #[error("token parse error: {0}")]
    InvalidToken(String),

    /// The credential was valid once but its expiry has passed.
    #[error("token expired")]
    Expired,

    /// The verifier was built without a signing secret. An empty HMAC key
    /// lets anyone mint credentials.
    #[error("signing secret is empty")]
    EmptySecret,
}

impl SessionError {
    /// The one-line text sent to a client refused at the upgrade.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "access token is empty",
            Self::InvalidToken(_) => notices::TOKEN_INVALID,
            Self::Expired => notices::TOKEN_EXPIRED,
            Self::EmptySecret => notices::TOKEN_INVALID,
        }
    }

    /// The private notice sent when a credential fails mid-session.
    pub fn to_notice(&self) -> Notice {
        Notice::unauthorized(self.client_message())
    }
}
