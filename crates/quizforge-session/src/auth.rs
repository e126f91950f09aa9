//! Authentication hook for validating participant identity.
//!
//! Quizforge does not issue credentials. Some other service signs them;
//! the server only checks them, once at the upgrade and again on every
//! action a participant sends, so a credential that runs out mid-game
//! stops working mid-game.
//!
//! The check sits behind the [`Authenticator`] trait so tests and other
//! deployments can swap in their own scheme. [`JwtAuthenticator`] is the
//! stock implementation: HS256 tokens with `{id, login, exp}` claims.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use quizforge_protocol::{Identity, PlayerId};
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Validates a bearer credential and returns who it belongs to.
///
/// # Trait bounds
///
/// - `Send + Sync` → one authenticator is shared by every connection task.
/// - `'static` → it lives as long as the server.
///
/// # Example
///
/// ```rust
/// use quizforge_protocol::{Identity, PlayerId};
/// use quizforge_session::{Authenticator, SessionError};
///
/// /// Accepts any numeric token. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
///         let id: u64 = token
///             .parse()
///             .map_err(|_| SessionError::InvalidToken("not a number".into()))?;
///         Ok(Identity { player_id: PlayerId(id), login: token.into(), expires_at: i64::MAX })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Verifies `token` (signature and expiry) and returns its identity.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}

/// The claims carried by a Quizforge credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: u64,
    pub login: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            player_id: PlayerId(claims.id),
            login: claims.login,
            expires_at: claims.exp,
        }
    }
}

/// Verifies HS256-signed JWTs with a shared secret.
#[derive(Clone)]
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Builds a verifier for `secret`. Fails on an empty secret.
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        // An expired credential must fail right away, not a minute later.
        validation.leeway = 0;
        Ok(Self {
            key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Synchronous core of [`Authenticator::authenticate`].
    pub fn verify(&self, token: &str) -> Result<Identity, SessionError> {
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }
        match jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(data.claims.into()),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                tracing::debug!("rejected expired credential");
                Err(SessionError::Expired)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected credential");
                Err(SessionError::InvalidToken(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator").finish_non_exhaustive()
    }
}

impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        self.verify(token)
    }
}
