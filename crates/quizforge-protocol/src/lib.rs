//! Wire protocol for Quizforge.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Identities** ([`PlayerId`], [`SessionId`], [`Role`], [`Identity`])
//! - **Client messages** ([`ClientEnvelope`], [`ActionKind`], [`ClientAction`])
//! - **Server messages** ([`ServerEvent`], [`EventBody`], [`Notice`])
//! - **Engine output** ([`Dispatch`], [`Recipient`])
//! - **Codec** ([`Codec`] trait, [`JsonCodec`])
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ClientAction) → Engine
//! Engine → Protocol (Dispatch) → Session registry → Transport
//! ```

mod action;
mod codec;
mod error;
mod event;
mod ids;

pub use action::{
    ActionKind, ChooseQuest, ClientAction, ClientEnvelope, CreateSession, GiveAnswer, JoinSession,
};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use event::{Dispatch, EventBody, Notice, ScoreEntry, ServerEvent, notices};
pub use ids::{Identity, PlayerId, Recipient, Role, SessionId};
