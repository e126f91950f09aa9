//! Per-connection handler: upgrade, credential check, connect handshake.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade to WebSocket, capturing the bearer credential
//!   2. Verify the credential → `Identity`
//!   3. Read the connect frame: `create` a session or `join` one
//!   4. Register with the session, send `connected_server`, run the pumps
//!
//! Rejections before `connected_server` are a single plain-text frame followed by a
//! close, so clients without a JSON parser can still show the reason.

use std::sync::Arc;

use quizforge_hub::{HubError, SessionEntry, SessionOptions};
use quizforge_protocol::{
    ClientEnvelope, Codec, CreateSession, EventBody, Identity, JoinSession, Role, ServerEvent,
};
use quizforge_session::Authenticator;
use quizforge_transport::{Connection, Inbound, Incoming, WebSocketConnection, WebSocketIncoming};
use tokio::time;

use crate::adapter::Admitted;
use crate::config::MAX_PLAYERS_LIMIT;
use crate::server::ServerState;
use crate::{PackLibrary, QuizforgeError, adapter};

/// Handshake rejection texts.
pub mod rejections {
    pub const INVALID_EVENT: &str = "invalid event";
    pub const INVALID_EVENT_DATA: &str = "invalid event data";
    pub const INVALID_GAME_NAME: &str = "invalid game name";
    pub const INVALID_PASSWORD: &str = "invalid password";
    pub const INCORRECT_PLAYERS_COUNT: &str = "incorrect players count";
    pub const UNKNOWN_PACK: &str = "unknown pack";
    pub const INCORRECT_HUB_ID: &str = "incorrect hub id";
    pub const INCORRECT_CONNECT_TYPE: &str = "incorrect connect type";
    pub const PLAYERS_LIMIT_REACHED: &str = "players limit reached";
}

/// Handles a single socket from accept to close.
pub(crate) async fn handle_connection<A, P>(
    incoming: WebSocketIncoming,
    state: Arc<ServerState<A, P>>,
) -> Result<(), QuizforgeError>
where
    A: Authenticator,
    P: PackLibrary,
{
    let peer = incoming.peer_addr();
    let conn = time::timeout(state.config.handshake_timeout(), incoming.upgrade())
        .await
        .map_err(|_| QuizforgeError::HandshakeTimeout)??;
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    // --- Step 1: credential ---
    let token = conn.credential().unwrap_or_default().to_owned();
    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "upgrade refused");
            reject(&conn, e.client_message()).await;
            return Ok(());
        }
    };
    let player_id = identity.player_id;

    // --- Step 2: connect frame ---
    let Some(data) = read_connect_frame(&conn, &state).await? else {
        return Ok(());
    };
    let envelope: ClientEnvelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%conn_id, %player_id, error = %e, "bad connect frame");
            reject(&conn, rejections::INVALID_EVENT).await;
            return Ok(());
        }
    };

    let (entry, role) = match envelope.kind.as_str() {
        "create" => match create_session(&state, &identity, &envelope).await {
            Ok(entry) => (entry, Role::Leader),
            Err(text) => {
                reject(&conn, text).await;
                return Ok(());
            }
        },
        "join" => match join_session(&state, &identity, &envelope).await {
            Ok(found) => found,
            Err(text) => {
                reject(&conn, text).await;
                return Ok(());
            }
        },
        other => {
            tracing::debug!(%conn_id, %player_id, kind = other, "unknown connect type");
            reject(&conn, rejections::INCORRECT_CONNECT_TYPE).await;
            return Ok(());
        }
    };
    let session_id = entry.session_id();

    // --- Step 3: register, acknowledge, run the pumps ---
    let connected = ServerEvent::new(EventBody::Connected {
        hub_id: session_id,
        player_id,
        role,
    });
    let ack = state.codec.encode(&connected)?;

    let adapter_config = state.config.adapter();
    let admitted = Admitted {
        token,
        identity,
        role,
        ack,
    };
    let result = adapter::run(
        Arc::clone(&conn),
        admitted,
        entry.hub,
        Arc::clone(&state.auth),
        &adapter_config,
    )
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(HubError::Full(_)) => {
            tracing::debug!(%conn_id, %player_id, %session_id, "session full");
            reject(&conn, rejections::PLAYERS_LIMIT_REACHED).await;
            Ok(())
        }
        Err(e) => {
            let _ = conn.close().await;
            Err(e.into())
        }
    }
}

/// Waits for the first application frame. Returns `None` if the client
/// went away first.
async fn read_connect_frame<A, P>(
    conn: &WebSocketConnection,
    state: &ServerState<A, P>,
) -> Result<Option<Vec<u8>>, QuizforgeError>
where
    A: Authenticator,
    P: PackLibrary,
{
    let deadline = time::Instant::now() + state.config.handshake_timeout();
    loop {
        match time::timeout_at(deadline, conn.recv()).await {
            Err(_) => {
                let _ = conn.close().await;
                return Err(QuizforgeError::HandshakeTimeout);
            }
            Ok(Ok(Some(Inbound::Frame(data)))) => return Ok(Some(data)),
            Ok(Ok(Some(Inbound::Heartbeat))) => continue,
            Ok(Ok(None)) => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}

async fn create_session<A, P>(
    state: &Arc<ServerState<A, P>>,
    identity: &Identity,
    envelope: &ClientEnvelope,
) -> Result<SessionEntry, &'static str>
where
    A: Authenticator,
    P: PackLibrary,
{
    let body: CreateSession = payload(envelope)?;
    if body.name.trim().is_empty() {
        return Err(rejections::INVALID_GAME_NAME);
    }
    if body.password.is_empty() {
        return Err(rejections::INVALID_PASSWORD);
    }
    if !(1..=MAX_PLAYERS_LIMIT).contains(&body.max_players) {
        return Err(rejections::INCORRECT_PLAYERS_COUNT);
    }
    let package = state.packs.get(&body.pack_id).ok_or(rejections::UNKNOWN_PACK)?;

    let options = SessionOptions {
        name: body.name,
        password: body.password,
        max_players: body.max_players as usize,
        leader: identity.player_id,
        pack_id: body.pack_id,
    };
    Ok(state.directory.create(options, package).await)
}

async fn join_session<A, P>(
    state: &Arc<ServerState<A, P>>,
    identity: &Identity,
    envelope: &ClientEnvelope,
) -> Result<(SessionEntry, Role), &'static str>
where
    A: Authenticator,
    P: PackLibrary,
{
    let body: JoinSession = payload(envelope)?;
    let entry = state
        .directory
        .lookup(body.hub_id)
        .await
        .map_err(|_| rejections::INCORRECT_HUB_ID)?;
    let role = if entry.options.leader == identity.player_id {
        Role::Leader
    } else {
        Role::Player
    };
    Ok((entry, role))
}

fn payload<T: serde::de::DeserializeOwned>(envelope: &ClientEnvelope) -> Result<T, &'static str> {
    serde_json::from_value(envelope.data.clone()).map_err(|_| rejections::INVALID_EVENT_DATA)
}

/// Sends a one-line text reason and closes. Failures are ignored: the
/// peer may already be gone.
async fn reject(conn: &WebSocketConnection, text: &str) {
    let _ = conn.send(text).await;
    let _ = conn.close().await;
}
