//! Error types for the protocol layer.
//!
//! When you see a `ProtocolError`, the problem is in turning frames into
//! typed messages (or back), never in networking or game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a frame).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope carried no action kind.
    #[error("empty action kind")]
    EmptyKind,

    /// The envelope named a kind clients may not send.
    #[error("unknown action kind: {0}")]
    UnknownKind(String),

    /// The message passed deserialization but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
