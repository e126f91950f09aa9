//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::{
    Connection, ConnectionId, Inbound, Incoming, Transport, TransportConfig, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: TransportConfig,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, TransportConfig::default()).await
    }

    /// Binds with explicit limits.
    pub async fn bind_with_config(
        addr: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the address the listener is bound to.
    ///
    /// Useful after binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Transport for WebSocketTransport {
    type Incoming = WebSocketIncoming;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }

        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        tracing::debug!(%addr, "accepted TCP connection");

        Ok(WebSocketIncoming {
            stream,
            addr,
            config: self.config.clone(),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::Release);
        tracing::info!("WebSocket transport stopped accepting");
        Ok(())
    }
}

/// A TCP stream that has not completed the WebSocket upgrade yet.
pub struct WebSocketIncoming {
    stream: TcpStream,
    addr: SocketAddr,
    config: TransportConfig,
}

impl WebSocketIncoming {
    /// The remote address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for WebSocketIncoming {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        // The Authorization header is only visible during the upgrade, so
        // the callback copies it out before the request is dropped.
        let mut credential: Option<String> = None;
        let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            credential = req
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(strip_bearer)
                .filter(|token| !token.is_empty())
                .map(str::to_owned);
            Ok(resp)
        };

        let ws = tokio_tungstenite::accept_hdr_async_with_config(
            self.stream,
            capture,
            Some(ws_config),
        )
        .await
        .map_err(|e| {
            TransportError::UpgradeFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, addr = %self.addr, "upgraded WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            credential,
            sink: Arc::new(Mutex::new(sink)),
            stream: Arc::new(Mutex::new(stream)),
        })
    }
}

/// Removes an optional `Bearer ` scheme prefix.
fn strip_bearer(header: &str) -> &str {
    let header = header.trim_start();
    match header.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => header[7..].trim(),
        _ => header.trim(),
    }
}

/// A single WebSocket connection.
///
/// The read and write halves sit behind separate locks, so a pending
/// `recv` never holds up a `send` from another task.
pub struct WebSocketConnection {
    id: ConnectionId,
    credential: Option<String>,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    stream: Arc<Mutex<SplitStream<WsStream>>>,
}

fn send_failed(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, frame: &str) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::text(frame))
            .await
            .map_err(send_failed)
    }

    async fn send_batch(&self, frames: &[Arc<str>]) -> Result<(), Self::Error> {
        let mut sink = self.sink.lock().await;
        for frame in frames {
            sink.feed(Message::text(&**frame)).await.map_err(send_failed)?;
        }
        sink.flush().await.map_err(send_failed)
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Default::default()))
            .await
            .map_err(send_failed)
    }

    async fn recv(&self) -> Result<Option<Inbound>, Self::Error> {
        let msg = self.stream.lock().await.next().await;
        match msg {
            Some(Ok(Message::Text(text))) => Ok(Some(Inbound::Frame(text.as_bytes().to_vec()))),
            Some(Ok(Message::Binary(data))) => Ok(Some(Inbound::Frame(data.into()))),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(Some(Inbound::Heartbeat)),
            Some(Ok(Message::Frame(_))) => Ok(Some(Inbound::Heartbeat)),
            Some(Ok(Message::Close(_))) | None => Ok(None),
            Some(Err(e)) => Err(TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                e,
            ))),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(send_failed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}
