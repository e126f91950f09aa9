//! Integration tests for the session registry, with a real engine behind it.

use std::sync::Arc;
use std::time::Duration;

use quizforge_content::{Package, Question, Round, Theme};
use quizforge_engine::Timings;
use quizforge_hub::{
    HubConfig, HubError, HubHandle, Participant, SessionDirectory, SessionOptions, spawn_session,
};
use quizforge_protocol::{ActionKind, ClientAction, Identity, PlayerId, Role, SessionId};
use quizforge_transport::ConnectionId;
use serde_json::Value;
use tokio::sync::mpsc;

const LEADER: PlayerId = PlayerId(1);

// =========================================================================
// Helpers
// =========================================================================

fn package() -> Arc<Package> {
    Arc::new(Package {
        name: "Pack".into(),
        author: "quiz team".into(),
        date: String::new(),
        rounds: vec![Round {
            id: 1,
            name: "Only".into(),
            themes: vec![Theme {
                id: 1,
                name: "Misc".into(),
                questions: vec![Question {
                    id: 1,
                    price: 100,
                    scene: Vec::new(),
                    answer: vec!["42".into()],
                }],
            }],
        }],
    })
}

fn options(max_players: usize) -> SessionOptions {
    SessionOptions {
        name: "friday".into(),
        password: "secret".into(),
        max_players,
        leader: LEADER,
        pack_id: "pack".into(),
    }
}

fn identity(id: u64) -> Identity {
    Identity {
        player_id: PlayerId(id),
        login: format!("user{id}"),
        expires_at: i64::MAX,
    }
}

fn spawn(max_players: usize) -> HubHandle {
    let (hub, _task) = spawn_session(
        SessionId(1),
        &options(max_players),
        package(),
        Timings::default(),
        &HubConfig::default(),
    );
    hub
}

async fn register(
    hub: &HubHandle,
    id: u64,
    conn: u64,
    capacity: usize,
) -> (Result<(), HubError>, mpsc::Receiver<Arc<str>>) {
    register_as(hub, identity(id), conn, capacity).await
}

async fn register_as(
    hub: &HubHandle,
    identity: Identity,
    conn: u64,
    capacity: usize,
) -> (Result<(), HubError>, mpsc::Receiver<Arc<str>>) {
    let role = if identity.player_id == LEADER {
        Role::Leader
    } else {
        Role::Player
    };
    let (tx, rx) = mpsc::channel(capacity);
    let participant = Participant::new(identity, role, ConnectionId::new(conn), tx);
    (hub.register(participant).await, rx)
}

/// Reads frames until one of the given type arrives, returning its data.
async fn expect_event(rx: &mut mpsc::Receiver<Arc<str>>, kind: &str) -> Value {
    loop {
        let frame = rx.recv().await.expect("outbound queue closed");
        let value: Value = serde_json::from_str(&frame).expect("json frame");
        if value["type"] == kind {
            return value["data"].clone();
        }
    }
}

// =========================================================================
// Registration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_register_broadcasts_join_to_members() {
    let hub = spawn(4);
    let (res, mut leader_rx) = register(&hub, 1, 10, 16).await;
    res.expect("leader registers");
    let (res, _p2) = register(&hub, 2, 20, 16).await;
    res.expect("player registers");

    let data = expect_event(&mut leader_rx, "join_server").await;
    assert_eq!(data["player_id"], 1);
    let data = expect_event(&mut leader_rx, "join_server").await;
    assert_eq!(data["player_id"], 2);
    assert_eq!(data["role"], "player");
}

#[tokio::test(start_paused = true)]
async fn test_register_full_rejects_extra_player() {
    let hub = spawn(1);
    let (res, _l) = register(&hub, 1, 10, 16).await;
    res.expect("leader does not count against the cap");
    let (res, _p2) = register(&hub, 2, 20, 16).await;
    res.expect("first player fits");
    let (res, _p3) = register(&hub, 3, 30, 16).await;
    assert!(matches!(res, Err(HubError::Full(SessionId(1)))));

    // Re-registering an existing identity is not a new player.
    let (res, _p2b) = register(&hub, 2, 21, 16).await;
    res.expect("reconnect fits");

    let info = hub.info().await.expect("info");
    assert_eq!(info.members, 2);
    assert_eq!(info.players, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reregister_closes_stale_queue_and_ignores_stale_unregister() {
    let hub = spawn(4);
    let (res, mut old_rx) = register(&hub, 2, 20, 16).await;
    res.expect("register");
    let (res, mut new_rx) = register(&hub, 2, 21, 16).await;
    res.expect("re-register");

    // The stale queue drains and then reports closed.
    while old_rx.recv().await.is_some() {}

    hub.unregister(PlayerId(2), ConnectionId::new(20)).await;
    let (res, _p3) = register(&hub, 3, 30, 16).await;
    res.expect("register");

    let data = loop {
        let data = expect_event(&mut new_rx, "join_server").await;
        if data["player_id"] == 3 {
            break data;
        }
    };
    assert_eq!(data["nickname"], "user3");
    assert_eq!(hub.info().await.expect("info").members, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unregister_broadcasts_disconnect() {
    let hub = spawn(4);
    let (res, mut leader_rx) = register(&hub, 1, 10, 16).await;
    res.expect("register");
    let (res, _p2) = register(&hub, 2, 20, 16).await;
    res.expect("register");

    hub.unregister(PlayerId(2), ConnectionId::new(20)).await;
    // Idempotent.
    hub.unregister(PlayerId(2), ConnectionId::new(20)).await;

    let data = expect_event(&mut leader_rx, "disconnect_server").await;
    assert_eq!(data["player_id"], 2);
    assert_eq!(hub.info().await.expect("info").members, 1);
}

// =========================================================================
// Fan-out
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_consumer_is_removed() {
    let hub = spawn(4);
    let (res, mut leader_rx) = register(&hub, 1, 10, 16).await;
    res.expect("register");
    // Room for one frame only, and nobody drains it.
    let (res, mut slow_rx) = register(&hub, 2, 20, 1).await;
    res.expect("register");

    let data = expect_event(&mut leader_rx, "disconnect_server").await;
    assert_eq!(data["player_id"], 2);

    // The slow participant got exactly one frame, then its queue closed.
    assert!(slow_rx.recv().await.is_some());
    assert!(slow_rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_private_notice_reaches_only_sender() {
    let hub = spawn(4);
    let (res, mut leader_rx) = register(&hub, 1, 10, 16).await;
    res.expect("register");
    let (res, mut p2_rx) = register(&hub, 2, 20, 16).await;
    res.expect("register");

    // A player may not start the game.
    let start = ClientAction {
        kind: ActionKind::StartGame,
        actor: identity(2),
        role: Role::Player,
        payload: Value::Null,
    };
    hub.engine().submit(start).await.expect("submit");

    let data = expect_event(&mut p2_rx, "error").await;
    assert_eq!(data["code"], 403);
    assert_eq!(data["message"], "permission denied");

    // The leader sees the next broadcast, not the notice.
    hub.unregister(PlayerId(2), ConnectionId::new(20)).await;
    loop {
        let frame = leader_rx.recv().await.expect("frame");
        let value: Value = serde_json::from_str(&frame).expect("json");
        assert_ne!(value["type"], "error");
        if value["type"] == "disconnect_server" {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_expired_credential_is_evicted() {
    let hub = spawn(4);
    let (res, mut leader_rx) = register(&hub, 1, 10, 16).await;
    res.expect("register");
    let mut expired = identity(2);
    expired.expires_at = 0;
    let (res, mut p2_rx) = register_as(&hub, expired.clone(), 20, 16).await;
    res.expect("register");

    let action = ClientAction {
        kind: ActionKind::GetQuest,
        actor: expired,
        role: Role::Player,
        payload: Value::Null,
    };
    hub.engine().submit(action).await.expect("submit");

    let data = expect_event(&mut p2_rx, "error").await;
    assert_eq!(data["message"], "token expired");
    assert!(p2_rx.recv().await.is_none(), "evicted queue is closed");

    let data = expect_event(&mut leader_rx, "disconnect_server").await;
    assert_eq!(data["player_id"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_eviction_spares_renewed_credential() {
    let hub = spawn(4);
    let (res, _leader_rx) = register(&hub, 1, 10, 16).await;
    res.expect("register");
    let mut expired = identity(2);
    expired.expires_at = 0;
    let (res, _old_rx) = register_as(&hub, expired.clone(), 20, 16).await;
    res.expect("register");

    // The player reconnects with a fresh credential before the old
    // connection's expired action reaches the engine.
    let (res, mut fresh_rx) = register(&hub, 2, 21, 16).await;
    res.expect("re-register");
    let stale = ClientAction {
        kind: ActionKind::GetQuest,
        actor: expired,
        role: Role::Player,
        payload: Value::Null,
    };
    hub.engine().submit(stale).await.expect("submit");
    let denied = ClientAction {
        kind: ActionKind::StartGame,
        actor: identity(2),
        role: Role::Player,
        payload: Value::Null,
    };
    hub.engine().submit(denied).await.expect("submit");

    let data = expect_event(&mut fresh_rx, "error").await;
    assert_eq!(data["message"], "permission denied");
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_every_queue() {
    let hub = spawn(4);
    let (res, mut rx) = register(&hub, 2, 20, 16).await;
    res.expect("register");
    hub.shutdown().await.expect("shutdown");

    while rx.recv().await.is_some() {}
    assert!(matches!(
        register(&hub, 3, 30, 16).await.0,
        Err(HubError::Unavailable(SessionId(1)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_directory_assigns_increasing_ids() {
    let directory = Arc::new(SessionDirectory::new(HubConfig::default(), Timings::default()));
    let first = directory.create(options(2), package()).await;
    let second = directory.create(options(2), package()).await;

    assert_eq!(first.session_id(), SessionId(1));
    assert_eq!(second.session_id(), SessionId(2));
    assert_eq!(directory.len().await, 2);

    let found = directory.lookup(SessionId(2)).await.expect("lookup");
    assert_eq!(found.options.name, "friday");
    assert!(matches!(
        directory.lookup(SessionId(9)).await,
        Err(HubError::NotFound(SessionId(9)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_empty_session_is_reaped_after_grace() {
    let directory = Arc::new(SessionDirectory::new(HubConfig::default(), Timings::default()));
    let entry = directory.create(options(2), package()).await;
    let (res, _rx) = register(&entry.hub, 2, 20, 16).await;
    res.expect("register");
    entry.hub.unregister(PlayerId(2), ConnectionId::new(20)).await;

    tokio::time::sleep(Duration::from_secs(61)).await;
    // Let the reaper observe the hub's exit.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(directory.is_empty().await);
    assert!(entry.hub.is_closed());
}
