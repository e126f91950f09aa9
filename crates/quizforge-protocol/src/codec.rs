//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and wire frames.
//! Nothing above this layer cares HOW a message is serialized, it only
//! needs something that implements [`Codec`].
//!
//! Frames are text on the wire, so `encode` yields a `String` that the
//! session registry can share between recipients without copying.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to text frames and decode frames back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between tasks on any runtime thread.
/// - `'static` → the codec owns everything it needs, so it can live inside
///   long-running tasks.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means the decoded value does
/// not borrow from the input buffer, which can then be dropped right away.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a frame back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use quizforge_protocol::{ClientEnvelope, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let env: ClientEnvelope = codec
///     .decode(br#"{"type":"get_quest","data":{}}"#)
///     .unwrap();
/// assert_eq!(env.kind, "get_quest");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
