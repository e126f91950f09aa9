//! Transport abstraction layer for Quizforge.
//!
//! Provides the [`Transport`], [`Incoming`] and [`Connection`] traits that
//! abstract over the persistent bidirectional link a participant holds with
//! the server.
//!
//! Accepting is split in two steps: [`Transport::accept`] only takes the raw
//! socket off the listener, and [`Incoming::upgrade`] performs the protocol
//! handshake. The accept loop never waits on a slow client that way, since
//! the upgrade runs inside the per-connection task.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketIncoming, WebSocketTransport};

use std::fmt;
use std::sync::Arc;

/// Default upper bound on a single inbound frame, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Transport-level limits applied to every accepted connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest inbound message accepted. A larger one fails `recv`, which
    /// terminates the connection.
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// What the remote peer sent us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An application frame (text or binary payload bytes).
    Frame(Vec<u8>),
    /// A control frame (ping or pong). Carries no data but proves the peer
    /// is alive, so read deadlines should be refreshed.
    Heartbeat,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A socket that has been accepted but not upgraded yet.
    type Incoming: Incoming;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Stops accepting. Later calls to `accept` fail with a shutdown error.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted socket waiting for its protocol handshake.
pub trait Incoming: Send + 'static {
    /// The connection type produced by a successful upgrade.
    type Connection: Connection;
    /// The error type for the upgrade.
    type Error: std::error::Error + Send + Sync;

    /// Runs the protocol handshake.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one text frame to the remote peer.
    async fn send(&self, frame: &str) -> Result<(), Self::Error>;

    /// Sends several text frames, flushing once at the end.
    ///
    /// Defaults to one `send` per frame. Implementations with a buffered
    /// sink should override this to coalesce the writes.
    async fn send_batch(&self, frames: &[Arc<str>]) -> Result<(), Self::Error> {
        for frame in frames {
            self.send(frame).await?;
        }
        Ok(())
    }

    /// Sends a ping frame to check the peer is alive.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Inbound>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the bearer credential presented during the upgrade, if any.
    fn credential(&self) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    #[test]
    fn test_transport_config_default_max_message_size() {
        assert_eq!(TransportConfig::default().max_message_size, 512);
    }
}
