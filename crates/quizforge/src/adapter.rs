//! Connection adapter: the read and write pumps of one participant.
//!
//! After the connect handshake a connection is handed to [`run`], which
//! splits it into two halves:
//!
//! - the **read pump** (this task) turns frames into [`ClientAction`]s for
//!   the engine, re-checking the bearer credential on every frame;
//! - the **write pump** (a spawned task) drains the participant's outbound
//!   queue onto the socket in batches and keeps the peer alive with pings.
//!
//! Either pump ending ends the other. The read pump then unregisters from
//! the hub, which drops the outbound queue.

use std::sync::Arc;
use std::time::Duration;

use quizforge_hub::{HubHandle, Participant};
use quizforge_protocol::{
    ClientAction, ClientEnvelope, Codec, Identity, JsonCodec, Notice, ProtocolError, Role,
    ServerEvent, notices,
};
use quizforge_session::Authenticator;
use quizforge_transport::{Connection, Inbound, WebSocketConnection};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

/// Per-connection limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Frames queued for the write pump before the hub gives up on us.
    pub outbound_capacity: usize,
    /// Longest silence tolerated from the peer. Any frame resets it.
    pub pong_wait: Duration,
    /// Interval between server pings.
    pub ping_period: Duration,
    /// Bound on a single socket write.
    pub write_wait: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            pong_wait: Duration::from_secs(120),
            ping_period: Duration::from_secs(108),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// A connection that passed the handshake.
pub(crate) struct Admitted {
    /// The raw bearer credential, re-checked on every frame.
    pub(crate) token: String,
    pub(crate) identity: Identity,
    pub(crate) role: Role,
    /// The encoded `connected_server` frame.
    pub(crate) ack: String,
}

/// Registers the connection with the hub, sends `ack` as the first frame
/// and runs both pumps until the connection ends.
///
/// Returns the hub's error (typically [`HubError::Full`]) without sending
/// anything if registration fails.
///
/// [`HubError::Full`]: quizforge_hub::HubError::Full
pub(crate) async fn run<A: Authenticator>(
    conn: Arc<WebSocketConnection>,
    admitted: Admitted,
    hub: HubHandle,
    auth: Arc<A>,
    config: &AdapterConfig,
) -> Result<(), quizforge_hub::HubError> {
    let Admitted {
        token,
        identity,
        role,
        ack,
    } = admitted;
    let conn_id = conn.id();
    let player_id = identity.player_id;
    let session_id = hub.session_id();

    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
    hub.register(Participant::new(identity.clone(), role, conn_id, outbound_tx))
        .await?;

    // Nothing drains the outbound queue yet, so the ack is always first.
    if !matches!(time::timeout(config.write_wait, conn.send(&ack)).await, Ok(Ok(()))) {
        tracing::debug!(%session_id, %player_id, %conn_id, "ack not delivered");
        hub.unregister(player_id, conn_id).await;
        let _ = conn.close().await;
        return Ok(());
    }

    let (writer_done_tx, writer_done_rx) = oneshot::channel::<()>();
    let (reader_done_tx, reader_done_rx) = oneshot::channel::<()>();
    let writer = tokio::spawn(write_pump(
        Arc::clone(&conn),
        outbound_rx,
        reader_done_rx,
        writer_done_tx,
        config.clone(),
    ));

    tracing::info!(%session_id, %player_id, %conn_id, %role, "participant connected");

    let reader = ReadPump {
        conn,
        token,
        identity,
        role,
        hub: hub.clone(),
        auth,
        codec: JsonCodec,
        config: config.clone(),
    };
    reader.run(writer_done_rx).await;

    drop(reader_done_tx);
    hub.unregister(player_id, conn_id).await;
    let _ = writer.await;

    tracing::info!(%session_id, %player_id, %conn_id, "participant disconnected");
    Ok(())
}

// ---------------------------------------------------------------------------
// Read pump
// ---------------------------------------------------------------------------

struct ReadPump<A> {
    conn: Arc<WebSocketConnection>,
    token: String,
    identity: Identity,
    role: Role,
    hub: HubHandle,
    auth: Arc<A>,
    codec: JsonCodec,
    config: AdapterConfig,
}

enum Flow {
    Continue,
    Stop,
}

impl<A: Authenticator> ReadPump<A> {
    async fn run(mut self, mut writer_done: oneshot::Receiver<()>) {
        let player_id = self.identity.player_id;
        let conn_id = self.conn.id();

        loop {
            let read = tokio::select! {
                biased;
                _ = &mut writer_done => {
                    tracing::debug!(%player_id, %conn_id, "write pump ended");
                    break;
                }
                read = time::timeout(self.config.pong_wait, self.conn.recv()) => read,
            };

            let inbound = match read {
                Err(_) => {
                    tracing::debug!(%player_id, %conn_id, "read deadline passed");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::debug!(%player_id, %conn_id, error = %e, "read failed");
                    break;
                }
                Ok(Ok(None)) => {
                    tracing::debug!(%player_id, %conn_id, "connection closed by peer");
                    break;
                }
                Ok(Ok(Some(inbound))) => inbound,
            };

            let Inbound::Frame(data) = inbound else {
                continue;
            };
            if let Flow::Stop = self.on_frame(&data).await {
                break;
            }
        }
    }

    async fn on_frame(&mut self, data: &[u8]) -> Flow {
        let player_id = self.identity.player_id;

        let envelope: ClientEnvelope = match self.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "undecodable frame");
                return self.notify(Notice::bad_request(notices::INCORRECT_DATA)).await;
            }
        };
        let kind = match envelope.action_kind() {
            Ok(kind) => kind,
            Err(ProtocolError::EmptyKind) => {
                return self.notify(Notice::bad_request(notices::INCORRECT_EVENT_TYPE)).await;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "rejected action kind");
                return self.notify(Notice::bad_request(notices::UNKNOWN_ACTION)).await;
            }
        };

        match self.auth.authenticate(&self.token).await {
            Ok(identity) => self.identity = identity,
            Err(e) => {
                tracing::info!(%player_id, error = %e, "credential no longer valid");
                let _ = self.notify(e.to_notice()).await;
                return Flow::Stop;
            }
        }

        let action = ClientAction {
            kind,
            actor: self.identity.clone(),
            role: self.role,
            payload: envelope.data,
        };
        match self.hub.engine().submit(action).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "engine gone");
                Flow::Stop
            }
        }
    }

    /// Sends a private notice straight to the socket.
    async fn notify(&self, notice: Notice) -> Flow {
        let frame = match self.codec.encode(&ServerEvent::notice(notice)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode notice");
                return Flow::Continue;
            }
        };
        match time::timeout(self.config.write_wait, self.conn.send(&frame)).await {
            Ok(Ok(())) => Flow::Continue,
            _ => Flow::Stop,
        }
    }
}

// ---------------------------------------------------------------------------
// Write pump
// ---------------------------------------------------------------------------

async fn write_pump(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    mut reader_done: oneshot::Receiver<()>,
    _writer_done: oneshot::Sender<()>,
    config: AdapterConfig,
) {
    let conn_id = conn.id();
    let mut ping = time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    let mut batch: Vec<Arc<str>> = Vec::new();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    tracing::debug!(%conn_id, "outbound queue closed");
                    break;
                };
                batch.push(frame);
                while let Ok(more) = outbound.try_recv() {
                    batch.push(more);
                }
                let sent = time::timeout(config.write_wait, conn.send_batch(&batch)).await;
                batch.clear();
                match sent {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%conn_id, "write stalled");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if !matches!(time::timeout(config.write_wait, conn.ping()).await, Ok(Ok(()))) {
                    tracing::debug!(%conn_id, "ping failed");
                    break;
                }
            }
            _ = &mut reader_done => break,
        }
    }

    let _ = time::timeout(config.write_wait, conn.close()).await;
}
