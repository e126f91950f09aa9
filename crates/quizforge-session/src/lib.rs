//! Participant authentication for Quizforge.
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection adapter (above)  ← checks the credential at upgrade and per action
//!     ↕
//! Session layer (this crate)  ← turns a bearer token into an Identity
//!     ↕
//! Protocol layer (below)      ← provides Identity, PlayerId, Notice
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;

pub use auth::{Authenticator, Claims, JwtAuthenticator};
pub use error::SessionError;
