//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it with a
//! `tokio-tungstenite` client, so the upgrade callback, frame limits, and the
//! split read/write halves are exercised over an actual socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use quizforge_transport::{
        Connection, Inbound, Incoming, Transport, TransportConfig, TransportError,
        WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Connects a client, optionally presenting an Authorization header.
    async fn connect_client(addr: std::net::SocketAddr, auth: Option<&str>) -> ClientWs {
        let mut request = format!("ws://{addr}")
            .into_client_request()
            .expect("valid request");
        if let Some(auth) = auth {
            request.headers_mut().insert(
                "Authorization",
                HeaderValue::from_str(auth).expect("valid header"),
            );
        }
        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("client should connect");
        ws
    }

    /// Binds a transport and returns it together with its address.
    async fn bind(config: TransportConfig) -> (WebSocketTransport, std::net::SocketAddr) {
        let transport = WebSocketTransport::bind_with_config("127.0.0.1:0", config)
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");
        (transport, addr)
    }

    /// Accepts and upgrades one connection in the background while a client
    /// connects in the foreground.
    async fn pair(
        config: TransportConfig,
        auth: Option<&str>,
    ) -> (WebSocketConnection, ClientWs) {
        let (mut transport, addr) = bind(config).await;
        let server = tokio::spawn(async move {
            let incoming = transport.accept().await.expect("should accept");
            incoming.upgrade().await.expect("should upgrade")
        });
        let client = connect_client(addr, auth).await;
        let conn = server.await.expect("task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_and_recv_text_frames() {
        let (conn, mut client) = pair(TransportConfig::default(), None).await;
        assert!(conn.id().into_inner() > 0);

        conn.send("hello from server").await.expect("send");
        let msg = client.next().await.expect("frame").expect("ok");
        assert_eq!(msg.into_text().expect("text").as_str(), "hello from server");

        client
            .send(Message::text("hello from client"))
            .await
            .expect("client send");
        let received = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(received, Inbound::Frame(b"hello from client".to_vec()));

        conn.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_websocket_upgrade_captures_bearer_credential() {
        let (conn, _client) = pair(TransportConfig::default(), Some("Bearer tok-123")).await;
        assert_eq!(conn.credential(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_websocket_upgrade_without_header_has_no_credential() {
        let (conn, _client) = pair(TransportConfig::default(), None).await;
        assert_eq!(conn.credential(), None);
    }

    #[tokio::test]
    async fn test_websocket_send_batch_delivers_in_order() {
        let (conn, mut client) = pair(TransportConfig::default(), None).await;
        let frames: Vec<Arc<str>> = vec![Arc::from("one"), Arc::from("two"), Arc::from("three")];
        conn.send_batch(&frames).await.expect("batch");

        for expected in ["one", "two", "three"] {
            let msg = client.next().await.expect("frame").expect("ok");
            assert_eq!(msg.into_text().expect("text").as_str(), expected);
        }
    }

    #[tokio::test]
    async fn test_websocket_recv_reports_pong_as_heartbeat() {
        let (conn, mut client) = pair(TransportConfig::default(), None).await;
        client
            .send(Message::Pong(Default::default()))
            .await
            .expect("pong");
        let received = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(received, Inbound::Heartbeat);
    }

    #[tokio::test]
    async fn test_websocket_recv_oversized_frame_fails() {
        let (conn, mut client) = pair(
            TransportConfig {
                max_message_size: 16,
            },
            None,
        )
        .await;
        client
            .send(Message::text("x".repeat(64)))
            .await
            .expect("client send");
        let result = conn.recv().await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));
    }

    #[tokio::test]
    async fn test_websocket_recv_does_not_block_send() {
        let (conn, mut client) = pair(TransportConfig::default(), None).await;
        let conn = Arc::new(conn);

        // A reader parked on recv must not keep the writer from sending.
        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::timeout(Duration::from_secs(2), conn.send("while reading"))
            .await
            .expect("send should not wait for recv")
            .expect("send");

        let msg = client.next().await.expect("frame").expect("ok");
        assert_eq!(msg.into_text().expect("text").as_str(), "while reading");

        client.send(Message::Close(None)).await.expect("close");
        let result = reader.await.expect("join").expect("recv");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (conn, mut client) = pair(TransportConfig::default(), None).await;
        client.send(Message::Close(None)).await.expect("close");
        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_accept_after_shutdown_fails() {
        let (mut transport, _addr) = bind(TransportConfig::default()).await;
        transport.shutdown().await.expect("shutdown");
        let result = transport.accept().await;
        assert!(matches!(result, Err(TransportError::Shutdown)));
    }
}
