//! Integration tests for the quiz server: handshake, session creation and
//! joining, and the connection adapter over real WebSocket clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header};
use quizforge::prelude::*;
use quizforge::rejections;
use quizforge_session::Claims;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

const SECRET: &[u8] = b"integration-secret";

// =========================================================================
// Fixtures
// =========================================================================

fn package() -> Package {
    let question = |id: u32, price: u32| Question {
        id,
        price,
        scene: Vec::new(),
        answer: vec![format!("answer {id}")],
    };
    Package {
        name: "Integration Pack".into(),
        author: "quiz team".into(),
        date: "2024-01-01".into(),
        rounds: vec![Round {
            id: 1,
            name: "Warm-up".into(),
            themes: vec![Theme {
                id: 1,
                name: "Rust".into(),
                questions: vec![question(1, 100), question(2, 200)],
            }],
        }],
    }
}

fn mint(id: u64, exp: i64) -> String {
    let claims = Claims {
        id,
        login: format!("user{id}"),
        exp,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .expect("token should encode")
}

fn token(id: u64) -> String {
    mint(id, chrono::Utc::now().timestamp() + 3600)
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: String::from_utf8_lossy(SECRET).into_owned(),
        ..ServerConfig::default()
    }
}

fn authenticator() -> JwtAuthenticator {
    JwtAuthenticator::new(SECRET).expect("secret is set")
}

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(config()).await
}

async fn start_server_with(config: ServerConfig) -> String {
    let packs = MemoryPackLibrary::new().with_pack("demo", package());
    let server = QuizforgeServerBuilder::new()
        .config(config)
        .build(authenticator(), packs)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str, token: Option<&str>) -> ClientWs {
    let mut request = format!("ws://{addr}")
        .into_client_request()
        .expect("valid request");
    if let Some(token) = token {
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {token}").parse().expect("valid header"),
        );
    }
    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send");
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut ClientWs) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame within 5s")
            .expect("stream open")
            .expect("valid frame");
        if msg.is_text() {
            return msg.to_text().expect("utf-8").to_owned();
        }
    }
}

/// Skips events until one of type `kind` arrives.
async fn wait_for(ws: &mut ClientWs, kind: &str) -> Value {
    loop {
        let event: Value = serde_json::from_str(&next_text(ws).await).expect("json event");
        if event["type"] == kind {
            return event;
        }
    }
}

/// Connects as `id` and creates a session. Returns the socket and hub id.
async fn create(addr: &str, id: u64, max_players: u32) -> (ClientWs, u64) {
    let mut ws = connect(addr, Some(&token(id))).await;
    send_json(
        &mut ws,
        json!({"type": "create", "data": {
            "name": "friday quiz", "password": "pw", "max_players": max_players, "pack_id": "demo"
        }}),
    )
    .await;
    let connected = wait_for(&mut ws, "connected_server").await;
    let hub_id = connected["data"]["hub_id"].as_u64().expect("hub id");
    (ws, hub_id)
}

async fn join(addr: &str, id: u64, hub_id: u64) -> ClientWs {
    let mut ws = connect(addr, Some(&token(id))).await;
    send_json(&mut ws, json!({"type": "join", "data": {"hub_id": hub_id}})).await;
    ws
}

/// Reads until the server closes the socket.
async fn expect_closed(ws: &mut ClientWs) {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("socket should close within 5s");
        match next {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => continue,
        }
    }
}

/// Waits on the leader's socket until `player` is reported gone.
async fn wait_for_departure(leader: &mut ClientWs, player: u64) {
    loop {
        let left = wait_for(leader, "disconnect_server").await;
        if left["data"]["player_id"] == player {
            break;
        }
    }
}

// =========================================================================
// Build
// =========================================================================

#[tokio::test]
async fn test_build_without_secret_is_refused() {
    let packs = MemoryPackLibrary::new().with_pack("demo", package());
    let result = QuizforgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(authenticator(), packs)
        .await;
    assert!(matches!(
        result,
        Err(QuizforgeError::Config(ConfigError::Invalid(_)))
    ));
}

// =========================================================================
// Upgrade
// =========================================================================

#[tokio::test]
async fn test_upgrade_without_token_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr, None).await;
    assert_eq!(next_text(&mut ws).await, "access token is empty");
}

#[tokio::test]
async fn test_upgrade_with_expired_token_is_rejected() {
    let addr = start_server().await;
    let expired = mint(1, chrono::Utc::now().timestamp() - 60);
    let mut ws = connect(&addr, Some(&expired)).await;
    assert_eq!(next_text(&mut ws).await, "token expired");
}

#[tokio::test]
async fn test_upgrade_with_forged_token_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr, Some("not.a.jwt")).await;
    assert_eq!(next_text(&mut ws).await, "token parse error");
}

// =========================================================================
// Connect handshake
// =========================================================================

#[tokio::test]
async fn test_connect_unknown_type_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr, Some(&token(1))).await;
    send_json(&mut ws, json!({"type": "spectate", "data": {}})).await;
    assert_eq!(next_text(&mut ws).await, rejections::INCORRECT_CONNECT_TYPE);
}

#[tokio::test]
async fn test_connect_garbage_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr, Some(&token(1))).await;
    ws.send(Message::text("{{{")).await.expect("send");
    assert_eq!(next_text(&mut ws).await, rejections::INVALID_EVENT);
}

#[tokio::test]
async fn test_create_returns_connected_as_leader() {
    let addr = start_server().await;
    let mut ws = connect(&addr, Some(&token(1))).await;
    send_json(
        &mut ws,
        json!({"type": "create", "data": {
            "name": "quiz", "password": "pw", "max_players": 4, "pack_id": "demo"
        }}),
    )
    .await;

    let event: Value = serde_json::from_str(&next_text(&mut ws).await).expect("json");
    assert_eq!(event["type"], "connected_server");
    assert_eq!(event["data"]["player_id"], 1);
    assert_eq!(event["data"]["role"], "leader");
    assert!(event["data"]["hub_id"].as_u64().is_some());
}

#[tokio::test]
async fn test_create_with_bad_settings_is_rejected() {
    let addr = start_server().await;

    let cases = [
        (json!({"name": " ", "password": "pw", "max_players": 2, "pack_id": "demo"}), rejections::INVALID_GAME_NAME),
        (json!({"name": "q", "password": "", "max_players": 2, "pack_id": "demo"}), rejections::INVALID_PASSWORD),
        (json!({"name": "q", "password": "pw", "max_players": 0, "pack_id": "demo"}), rejections::INCORRECT_PLAYERS_COUNT),
        (json!({"name": "q", "password": "pw", "max_players": 9, "pack_id": "demo"}), rejections::INCORRECT_PLAYERS_COUNT),
        (json!({"name": "q", "password": "pw", "max_players": 2, "pack_id": "nope"}), rejections::UNKNOWN_PACK),
        (json!({"name": "q"}), rejections::INVALID_EVENT_DATA),
    ];
    for (data, expected) in cases {
        let mut ws = connect(&addr, Some(&token(1))).await;
        send_json(&mut ws, json!({"type": "create", "data": data})).await;
        assert_eq!(next_text(&mut ws).await, expected);
    }
}

#[tokio::test]
async fn test_join_unknown_hub_is_rejected() {
    let addr = start_server().await;
    let mut ws = join(&addr, 2, 9999).await;
    assert_eq!(next_text(&mut ws).await, rejections::INCORRECT_HUB_ID);
}

#[tokio::test]
async fn test_join_is_broadcast_to_leader() {
    let addr = start_server().await;
    let (mut leader, hub_id) = create(&addr, 1, 4).await;

    let mut player = join(&addr, 2, hub_id).await;
    let connected = wait_for(&mut player, "connected_server").await;
    assert_eq!(connected["data"]["role"], "player");
    assert_eq!(connected["data"]["hub_id"], hub_id);

    loop {
        let joined = wait_for(&mut leader, "join_server").await;
        if joined["data"]["player_id"] == 2 {
            assert_eq!(joined["data"]["nickname"], "user2");
            assert_eq!(joined["data"]["role"], "player");
            break;
        }
    }
}

#[tokio::test]
async fn test_join_full_session_is_rejected() {
    let addr = start_server().await;
    let (_leader, hub_id) = create(&addr, 1, 1).await;

    let mut first = join(&addr, 2, hub_id).await;
    wait_for(&mut first, "connected_server").await;

    let mut second = join(&addr, 3, hub_id).await;
    assert_eq!(next_text(&mut second).await, rejections::PLAYERS_LIMIT_REACHED);
}

#[tokio::test]
async fn test_leader_rejoin_keeps_leader_role() {
    let addr = start_server().await;
    let (leader, hub_id) = create(&addr, 1, 2).await;
    drop(leader);

    let mut again = join(&addr, 1, hub_id).await;
    let connected = wait_for(&mut again, "connected_server").await;
    assert_eq!(connected["data"]["role"], "leader");
}

// =========================================================================
// In-session frames
// =========================================================================

#[tokio::test]
async fn test_undecodable_frame_gets_incorrect_data() {
    let addr = start_server().await;
    let (mut leader, _) = create(&addr, 1, 2).await;

    leader.send(Message::text("not json")).await.expect("send");
    let error = wait_for(&mut leader, "error").await;
    assert_eq!(error["data"]["code"], 400);
    assert_eq!(error["data"]["message"], "incorrect data");
}

#[tokio::test]
async fn test_unknown_action_gets_notice_and_connection_survives() {
    let addr = start_server().await;
    let (mut leader, _) = create(&addr, 1, 2).await;

    send_json(&mut leader, json!({"type": "dance", "data": {}})).await;
    let error = wait_for(&mut leader, "error").await;
    assert_eq!(error["data"]["message"], "unknown action kind");

    send_json(&mut leader, json!({"data": {}})).await;
    let error = wait_for(&mut leader, "error").await;
    assert_eq!(error["data"]["message"], "incorrect event type");
}

#[tokio::test]
async fn test_player_cannot_start_game() {
    let addr = start_server().await;
    let (_leader, hub_id) = create(&addr, 1, 4).await;

    let mut player = join(&addr, 2, hub_id).await;
    wait_for(&mut player, "connected_server").await;
    send_json(&mut player, json!({"type": "start_game", "data": {}})).await;

    let error = wait_for(&mut player, "error").await;
    assert_eq!(error["data"]["code"], 403);
    assert_eq!(error["data"]["message"], "permission denied");
}

#[tokio::test]
async fn test_leader_start_with_player_greets_everyone() {
    let addr = start_server().await;
    let (mut leader, hub_id) = create(&addr, 1, 4).await;

    let mut player = join(&addr, 2, hub_id).await;
    wait_for(&mut player, "connected_server").await;
    loop {
        let joined = wait_for(&mut leader, "join_server").await;
        if joined["data"]["player_id"] == 2 {
            break;
        }
    }

    send_json(&mut leader, json!({"type": "start_game", "data": {}})).await;
    let greeting = wait_for(&mut player, "greetings_server").await;
    assert_eq!(greeting["data"]["name"], "Integration Pack");
    assert!(greeting["exp"].as_i64().expect("deadline") > 0);
    wait_for(&mut leader, "greetings_server").await;
}

// =========================================================================
// Liveness and credential expiry
// =========================================================================

#[tokio::test]
async fn test_credential_expiring_mid_session_drops_connection() {
    let addr = start_server().await;
    let (mut leader, hub_id) = create(&addr, 1, 4).await;

    let short_lived = mint(2, chrono::Utc::now().timestamp() + 2);
    let mut player = connect(&addr, Some(&short_lived)).await;
    send_json(&mut player, json!({"type": "join", "data": {"hub_id": hub_id}})).await;
    wait_for(&mut player, "connected_server").await;

    tokio::time::sleep(Duration::from_millis(3500)).await;
    send_json(&mut player, json!({"type": "get_quest", "data": {}})).await;

    let error = wait_for(&mut player, "error").await;
    assert_eq!(error["data"]["code"], 401);
    assert_eq!(error["data"]["message"], "token expired");
    expect_closed(&mut player).await;

    wait_for_departure(&mut leader, 2).await;
}

#[tokio::test]
async fn test_idle_connection_receives_pings() {
    let addr = start_server_with(ServerConfig {
        ping_period_secs: 1,
        pong_wait_secs: 3,
        ..config()
    })
    .await;
    let (mut leader, _) = create(&addr, 1, 2).await;

    let pinged = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match leader.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await
    .expect("ping within 5s");
    assert!(pinged);
}

#[tokio::test]
async fn test_silent_connection_hits_read_deadline() {
    let addr = start_server_with(ServerConfig {
        ping_period_secs: 1,
        pong_wait_secs: 2,
        ..config()
    })
    .await;
    let (mut leader, hub_id) = create(&addr, 1, 4).await;

    // Never polled again, so it answers no pings and sends nothing.
    let mut silent = join(&addr, 2, hub_id).await;
    wait_for(&mut silent, "connected_server").await;

    wait_for_departure(&mut leader, 2).await;
    drop(silent);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_run_until_closes_sessions_and_sockets() {
    let packs = MemoryPackLibrary::new().with_pack("demo", package());
    let server = QuizforgeServerBuilder::new()
        .config(config())
        .build(authenticator(), packs)
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    let directory = server.directory();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let (mut leader, _) = create(&addr, 1, 2).await;
    assert_eq!(directory.len().await, 1);

    stop_tx.send(()).expect("server still running");
    task.await.expect("task joins").expect("clean stop");

    expect_closed(&mut leader).await;
}
